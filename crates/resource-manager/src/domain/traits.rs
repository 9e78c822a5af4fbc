//! Collaborators of the reconciler.

use async_trait::async_trait;
use error_stack::Report;
use k8s_openapi::api::core::v1::Node;
use nodecore_types::Flavor;
use nodecore_types::NodeIdentity;

use crate::domain::error::StoreError;
use crate::k8s::KubernetesError;
use crate::k8s::NodeMetrics;

/// Read access to nodes and their usage snapshots.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// `None` when the node does not exist.
    async fn node(&self, name: &str) -> Result<Option<Node>, Report<KubernetesError>>;

    async fn node_metrics(&self, name: &str) -> Result<NodeMetrics, Report<KubernetesError>>;
}

/// Persistence of flavors with optimistic concurrency.
#[async_trait]
pub trait FlavorStore: Send + Sync {
    /// Flavors with an owner reference named `owner`.
    async fn list_by_owner_name(&self, owner: &str) -> Result<Vec<Flavor>, Report<StoreError>>;

    async fn create(&self, flavor: &Flavor) -> Result<Flavor, Report<StoreError>>;

    /// Replace a flavor. Fails with [`StoreError::Conflict`] when the stored
    /// resource version differs from the one carried by `flavor`.
    async fn replace(&self, flavor: &Flavor) -> Result<Flavor, Report<StoreError>>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` while the provider identity is not published yet.
    async fn identity(&self) -> Result<Option<NodeIdentity>, Report<KubernetesError>>;
}

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self) -> bool;
}
