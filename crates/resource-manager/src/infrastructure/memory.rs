//! In-process collaborators, used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use error_stack::Report;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use nodecore_types::Flavor;
use nodecore_types::NodeIdentity;
use tokio::sync::RwLock;

use crate::domain::error::StoreError;
use crate::domain::traits::FlavorStore;
use crate::domain::traits::IdentityProvider;
use crate::domain::traits::NodeSource;
use crate::k8s::KubernetesError;
use crate::k8s::NodeMetrics;

/// Flavor store keeping every document in memory.
///
/// Each write bumps a store-wide revision that becomes the document's
/// `resourceVersion`; replaces are compare-and-swap on it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFlavorStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    revision: u64,
    /// Keyed by (namespace, name).
    flavors: BTreeMap<(String, String), Flavor>,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision = self.revision.saturating_add(1);
        self.revision
    }
}

fn key(flavor: &Flavor) -> (String, String) {
    (flavor.namespace().unwrap_or_default(), flavor.name_any())
}

impl InMemoryFlavorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes accepted so far.
    pub async fn revision(&self) -> u64 {
        self.inner.read().await.revision
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Option<Flavor> {
        let inner = self.inner.read().await;
        inner
            .flavors
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn all(&self) -> Vec<Flavor> {
        self.inner.read().await.flavors.values().cloned().collect()
    }
}

#[async_trait]
impl FlavorStore for InMemoryFlavorStore {
    async fn list_by_owner_name(&self, owner: &str) -> Result<Vec<Flavor>, Report<StoreError>> {
        let inner = self.inner.read().await;
        Ok(inner
            .flavors
            .values()
            .filter(|flavor| flavor.owner_index_keys().iter().any(|key| key == owner))
            .cloned()
            .collect())
    }

    async fn create(&self, flavor: &Flavor) -> Result<Flavor, Report<StoreError>> {
        let mut inner = self.inner.write().await;
        let key = key(flavor);
        if inner.flavors.contains_key(&key) {
            return Err(Report::new(StoreError::Conflict { name: key.1 }));
        }

        let revision = inner.next_revision();
        let mut stored = flavor.clone();
        stored.metadata.resource_version = Some(revision.to_string());
        stored.metadata.uid = Some(format!("flavor-{revision}"));
        inner.flavors.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace(&self, flavor: &Flavor) -> Result<Flavor, Report<StoreError>> {
        let mut inner = self.inner.write().await;
        let key = key(flavor);
        let Some(current) = inner.flavors.get(&key) else {
            return Err(Report::new(StoreError::Backend {
                operation: "replace a missing flavor",
            }));
        };
        if current.metadata.resource_version != flavor.metadata.resource_version {
            return Err(Report::new(StoreError::Conflict { name: key.1 }));
        }

        let revision = inner.next_revision();
        let mut stored = flavor.clone();
        stored.metadata.resource_version = Some(revision.to_string());
        inner.flavors.insert(key, stored.clone());
        Ok(stored)
    }
}

/// Node source serving whatever was inserted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNodeSource {
    nodes: Arc<RwLock<BTreeMap<String, Node>>>,
    metrics: Arc<RwLock<BTreeMap<String, NodeMetrics>>>,
}

impl InMemoryNodeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_node(&self, node: Node) {
        self.nodes.write().await.insert(node.name_any(), node);
    }

    pub async fn remove_node(&self, name: &str) {
        self.nodes.write().await.remove(name);
    }

    /// Serve `metrics` as the usage snapshot of node `name`.
    pub async fn insert_metrics(&self, name: &str, metrics: NodeMetrics) {
        self.metrics.write().await.insert(name.to_string(), metrics);
    }
}

#[async_trait]
impl NodeSource for InMemoryNodeSource {
    async fn node(&self, name: &str) -> Result<Option<Node>, Report<KubernetesError>> {
        Ok(self.nodes.read().await.get(name).cloned())
    }

    async fn node_metrics(&self, name: &str) -> Result<NodeMetrics, Report<KubernetesError>> {
        self.metrics
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| {
                Report::new(KubernetesError::GetFailed {
                    kind: "NodeMetrics",
                    name: name.to_string(),
                })
            })
    }
}

/// Identity provider answering with a fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    identity: Option<NodeIdentity>,
}

impl StaticIdentityProvider {
    pub const fn new(identity: Option<NodeIdentity>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn identity(&self) -> Result<Option<NodeIdentity>, Report<KubernetesError>> {
        Ok(self.identity.clone())
    }
}
