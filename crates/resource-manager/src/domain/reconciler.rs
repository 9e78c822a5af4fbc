use std::sync::Arc;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use nodecore_types::k8slice::Partitionability;
use nodecore_types::Flavor;
use nodecore_types::NODE_OWNER_KIND;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::domain::error::ReconcileError;
use crate::domain::error::StoreError;
use crate::domain::node_info::node_info;
use crate::domain::node_info::NodeInfoError;
use crate::domain::offer;
use crate::domain::offer::OfferContext;
use crate::domain::offer::OfferDefaults;
use crate::domain::offer::OfferError;
use crate::domain::traits::FlavorStore;
use crate::domain::traits::IdentityProvider;
use crate::domain::traits::NodeSource;
use crate::domain::traits::ReadinessProbe;
use crate::k8s::LABEL_ENABLED;

/// Static configuration of the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub enable_auto_discovery: bool,
    /// Nodes are enrolled by setting this label to `true`.
    pub resource_node_label: String,
    /// Namespace new flavors are created in.
    pub namespace: String,
    pub offer_defaults: OfferDefaults,
    pub partitionability: Partitionability,
}

/// How a pass ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Disabled,
    /// A dependency is not ready yet; the pass should be retried.
    NotReady,
    NodeNotFound,
    NotSelected,
    IdentityUnavailable,
    Created { name: String },
    Updated { name: String },
    Unchanged { name: String },
}

impl ReconcileOutcome {
    pub const fn needs_retry(&self) -> bool {
        matches!(self, Self::NotReady)
    }
}

pub struct Reconciler {
    settings: ReconcilerSettings,
    nodes: Arc<dyn NodeSource>,
    flavors: Arc<dyn FlavorStore>,
    identity: Arc<dyn IdentityProvider>,
    readiness: Arc<dyn ReadinessProbe>,
}

impl Reconciler {
    pub fn new(
        settings: ReconcilerSettings,
        nodes: Arc<dyn NodeSource>,
        flavors: Arc<dyn FlavorStore>,
        identity: Arc<dyn IdentityProvider>,
        readiness: Arc<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            settings,
            nodes,
            flavors,
            identity,
            readiness,
        }
    }

    pub const fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Whether the node carries the enrollment label.
    pub fn is_selected(&self, node: &Node) -> bool {
        node.labels()
            .get(&self.settings.resource_node_label)
            .is_some_and(|value| value == LABEL_ENABLED)
    }

    /// Run one pass for the named node: make sure a flavor advertising its
    /// capacity exists and is up to date.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileError`]; [`ReconcileError::is_retryable`] tells
    /// whether the pass should be scheduled again.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, node_name: &str) -> Result<ReconcileOutcome, Report<ReconcileError>> {
        if !self.settings.enable_auto_discovery {
            info!("Auto discovery is disabled");
            return Ok(ReconcileOutcome::Disabled);
        }

        if !self.readiness.is_ready().await {
            info!("Readiness dependency is not up yet, requeuing");
            return Ok(ReconcileOutcome::NotReady);
        }

        let node = self
            .nodes
            .node(node_name)
            .await
            .change_context_lazy(|| ReconcileError::NodeUnavailable {
                node: node_name.to_string(),
            })?;
        let Some(node) = node else {
            info!("Node not found");
            return Ok(ReconcileOutcome::NodeNotFound);
        };

        if !self.is_selected(&node) {
            info!(
                "Node does not have the label {}",
                self.settings.resource_node_label
            );
            return Ok(ReconcileOutcome::NotSelected);
        }

        let metrics = self
            .nodes
            .node_metrics(node_name)
            .await
            .change_context_lazy(|| ReconcileError::UsageUnavailable {
                node: node_name.to_string(),
            })?;

        let info = node_info(&node, &metrics).map_err(|report| {
            let error = match report.current_context() {
                NodeInfoError::IdentityMismatch { .. } => ReconcileError::IdentityMismatch {
                    node: node_name.to_string(),
                },
                NodeInfoError::MalformedQuantity { .. } | NodeInfoError::Characterization { .. } => {
                    ReconcileError::MalformedInput {
                        node: node_name.to_string(),
                    }
                }
            };
            report.change_context(error)
        })?;
        debug!(
            architecture = %info.architecture,
            cpu_available = %info.resource_metrics.cpu_available,
            memory_available = %info.resource_metrics.memory_available,
            "NodeInfo created"
        );

        let identity = self
            .identity
            .identity()
            .await
            .change_context(ReconcileError::IdentityLookup)?;
        let Some(identity) = identity else {
            info!("Provider identity is not available yet");
            return Ok(ReconcileOutcome::IdentityUnavailable);
        };

        let candidates = self
            .flavors
            .list_by_owner_name(node_name)
            .await
            .change_context_lazy(|| ReconcileError::Lookup {
                node: node_name.to_string(),
            })?;
        let existing = select_owned_flavor(&candidates);

        let ctx = OfferContext {
            identity: &identity,
            namespace: &self.settings.namespace,
            defaults: &self.settings.offer_defaults,
            partitionability: &self.settings.partitionability,
        };

        match existing {
            Some(existing) => {
                let name = existing.name_any();
                info!(flavor = %name, "Flavor found");
                let refreshed = offer::refresh_document(existing, &info, ctx)
                    .map_err(|report| offer_error(report, &name))?;

                if refreshed == *existing {
                    info!(flavor = %name, "Flavor is up to date");
                    return Ok(ReconcileOutcome::Unchanged { name });
                }

                self.flavors
                    .replace(&refreshed)
                    .await
                    .map_err(|report| persist_error(report, &name))?;
                info!(flavor = %name, "Flavor updated");
                Ok(ReconcileOutcome::Updated { name })
            }
            None => {
                let name = offer::flavor_name(&identity.domain);
                let document = offer::new_document(name.clone(), &info, ctx)
                    .map_err(|report| offer_error(report, &name))?;

                self.flavors
                    .create(&document)
                    .await
                    .map_err(|report| persist_error(report, &name))?;
                info!(flavor = %name, "Flavor created");
                Ok(ReconcileOutcome::Created { name })
            }
        }
    }
}

/// The first flavor with a Node-kind owner reference.
///
/// The owner-name lookup may also return flavors that merely share an owner
/// name with the node; those are not ours. Should several Node-owned flavors
/// exist, the others are left alone.
fn select_owned_flavor(candidates: &[Flavor]) -> Option<&Flavor> {
    let mut owned = candidates
        .iter()
        .filter(|flavor| flavor.has_owner_kind(NODE_OWNER_KIND));
    let selected = owned.next();
    let ignored = owned.count();
    if ignored > 0 {
        warn!("{ignored} more Node-owned flavors found, using the first one");
    }
    selected
}

fn offer_error(report: Report<OfferError>, name: &str) -> Report<ReconcileError> {
    let name = name.to_string();
    let error = match report.current_context() {
        OfferError::Encode { .. } => ReconcileError::Encode { name },
        OfferError::UnsupportedType { .. } => ReconcileError::UnsupportedFlavorType { name },
    };
    report.change_context(error)
}

fn persist_error(report: Report<StoreError>, name: &str) -> Report<ReconcileError> {
    let error = match report.current_context() {
        StoreError::Conflict { .. } => ReconcileError::Conflict {
            name: name.to_string(),
        },
        StoreError::Backend { .. } => ReconcileError::Persist {
            name: name.to_string(),
        },
    };
    report.change_context(error)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::NodeStatus;
    use k8s_openapi::api::core::v1::NodeSystemInfo;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use nodecore_types::FlavorSpec;
    use nodecore_types::FlavorTypeData;
    use nodecore_types::NodeIdentity;
    use nodecore_types::Quantity;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::infrastructure::AlwaysReady;
    use crate::infrastructure::InMemoryFlavorStore;
    use crate::infrastructure::InMemoryNodeSource;
    use crate::infrastructure::StaticIdentityProvider;
    use crate::k8s::KubernetesError;
    use crate::k8s::NodeMetrics;

    const LABEL: &str = "node-role.fluidos.eu/resources";

    struct NeverReady;

    #[async_trait]
    impl ReadinessProbe for NeverReady {
        async fn is_ready(&self) -> bool {
            false
        }
    }

    struct UnreachableNodes;

    #[async_trait]
    impl NodeSource for UnreachableNodes {
        async fn node(&self, name: &str) -> Result<Option<Node>, Report<KubernetesError>> {
            Err(Report::new(KubernetesError::GetFailed {
                kind: "Node",
                name: name.to_string(),
            }))
        }

        async fn node_metrics(&self, name: &str) -> Result<NodeMetrics, Report<KubernetesError>> {
            Err(Report::new(KubernetesError::GetFailed {
                kind: "NodeMetrics",
                name: name.to_string(),
            }))
        }
    }

    /// Reads succeed, every write fails.
    struct ReadOnlyStore(InMemoryFlavorStore);

    #[async_trait]
    impl FlavorStore for ReadOnlyStore {
        async fn list_by_owner_name(&self, owner: &str) -> Result<Vec<Flavor>, Report<StoreError>> {
            self.0.list_by_owner_name(owner).await
        }

        async fn create(&self, _flavor: &Flavor) -> Result<Flavor, Report<StoreError>> {
            Err(Report::new(StoreError::Backend { operation: "create" }))
        }

        async fn replace(&self, _flavor: &Flavor) -> Result<Flavor, Report<StoreError>> {
            Err(Report::new(StoreError::Backend {
                operation: "replace",
            }))
        }
    }

    fn resources(pairs: &[(&str, &str)]) -> BTreeMap<String, K8sQuantity> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), K8sQuantity(v.to_string())))
            .collect()
    }

    fn node(name: &str, selected: bool) -> Node {
        let labels = selected.then(|| BTreeMap::from([(LABEL.to_string(), "true".to_string())]));
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: Some(format!("uid-{name}")),
                labels,
                ..Default::default()
            },
            status: Some(NodeStatus {
                allocatable: Some(resources(&[("cpu", "4"), ("memory", "8Gi"), ("pods", "110")])),
                node_info: Some(NodeSystemInfo {
                    architecture: "amd64".to_string(),
                    operating_system: "linux".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn metrics(name: &str, cpu: &str) -> NodeMetrics {
        NodeMetrics {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            usage: resources(&[("cpu", cpu), ("memory", "1Gi"), ("pods", "10")]),
            ..Default::default()
        }
    }

    fn settings() -> ReconcilerSettings {
        ReconcilerSettings {
            enable_auto_discovery: true,
            resource_node_label: LABEL.to_string(),
            namespace: "fluidos".to_string(),
            offer_defaults: OfferDefaults::default(),
            partitionability: Partitionability::default(),
        }
    }

    fn identity() -> NodeIdentity {
        NodeIdentity {
            domain: "fluidos.eu".to_string(),
            node_id: "provider-1".to_string(),
            ip: String::new(),
        }
    }

    struct Harness {
        nodes: InMemoryNodeSource,
        store: InMemoryFlavorStore,
        reconciler: Reconciler,
    }

    fn harness_with(
        settings: ReconcilerSettings,
        identity: Option<NodeIdentity>,
        readiness: Arc<dyn ReadinessProbe>,
    ) -> Harness {
        let nodes = InMemoryNodeSource::new();
        let store = InMemoryFlavorStore::new();
        let reconciler = Reconciler::new(
            settings,
            Arc::new(nodes.clone()),
            Arc::new(store.clone()),
            Arc::new(StaticIdentityProvider::new(identity)),
            readiness,
        );
        Harness {
            nodes,
            store,
            reconciler,
        }
    }

    fn harness() -> Harness {
        harness_with(settings(), Some(identity()), Arc::new(AlwaysReady))
    }

    fn slice_of(flavor: &Flavor) -> nodecore_types::K8Slice {
        match flavor.spec.flavor_type.decode().unwrap() {
            FlavorTypeData::K8Slice(slice) => slice,
        }
    }

    #[test(tokio::test)]
    async fn disabled_pipeline_is_a_no_op() {
        let h = harness_with(
            ReconcilerSettings {
                enable_auto_discovery: false,
                ..settings()
            },
            Some(identity()),
            Arc::new(AlwaysReady),
        );
        h.nodes.insert_node(node("worker-1", true)).await;

        let outcome = h.reconciler.reconcile("worker-1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Disabled);
        assert!(!outcome.needs_retry());
        assert_eq!(h.store.revision().await, 0);
    }

    #[test(tokio::test)]
    async fn not_ready_requests_a_retry() {
        let h = harness_with(settings(), Some(identity()), Arc::new(NeverReady));
        let outcome = h.reconciler.reconcile("worker-1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotReady);
        assert!(outcome.needs_retry());
    }

    #[test(tokio::test)]
    async fn missing_or_unlabelled_nodes_are_skipped() {
        let h = harness();
        assert_eq!(
            h.reconciler.reconcile("ghost").await.unwrap(),
            ReconcileOutcome::NodeNotFound
        );

        h.nodes.insert_node(node("worker-2", false)).await;
        h.nodes.insert_metrics("worker-2", metrics("worker-2", "1")).await;
        assert_eq!(
            h.reconciler.reconcile("worker-2").await.unwrap(),
            ReconcileOutcome::NotSelected
        );
        assert_eq!(h.store.revision().await, 0);
    }

    #[test(tokio::test)]
    async fn missing_usage_is_retryable() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;

        let err = h.reconciler.reconcile("worker-1").await.unwrap_err();
        assert_eq!(
            *err.current_context(),
            ReconcileError::UsageUnavailable {
                node: "worker-1".to_string()
            }
        );
        assert!(err.current_context().is_retryable());
    }

    #[test(tokio::test)]
    async fn failed_node_read_is_retryable() {
        let reconciler = Reconciler::new(
            settings(),
            Arc::new(UnreachableNodes),
            Arc::new(InMemoryFlavorStore::new()),
            Arc::new(StaticIdentityProvider::new(Some(identity()))),
            Arc::new(AlwaysReady),
        );

        let err = reconciler.reconcile("worker-1").await.unwrap_err();
        assert_eq!(
            *err.current_context(),
            ReconcileError::NodeUnavailable {
                node: "worker-1".to_string()
            }
        );
        assert!(err.current_context().is_retryable());
    }

    #[test(tokio::test)]
    async fn failed_writes_are_retryable_and_leave_the_store_untouched() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "1")).await;
        let read_only = Reconciler::new(
            settings(),
            Arc::new(h.nodes.clone()),
            Arc::new(ReadOnlyStore(h.store.clone())),
            Arc::new(StaticIdentityProvider::new(Some(identity()))),
            Arc::new(AlwaysReady),
        );

        let err = read_only.reconcile("worker-1").await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            ReconcileError::Persist { name } if name.starts_with("fluidos.eu-k8slice-")
        ));
        assert!(err.current_context().is_retryable());
        assert_eq!(h.store.revision().await, 0);

        let ReconcileOutcome::Created { name } = h.reconciler.reconcile("worker-1").await.unwrap()
        else {
            panic!("expected a new flavor");
        };
        let created = h.store.get("fluidos", &name).await.unwrap();

        let mut upgraded = node("worker-1", true);
        upgraded
            .annotations_mut()
            .insert("gpu.fluidos.eu/model".to_string(), "a100".to_string());
        h.nodes.insert_node(upgraded).await;

        let err = read_only.reconcile("worker-1").await.unwrap_err();
        assert_eq!(
            *err.current_context(),
            ReconcileError::Persist { name: name.clone() }
        );
        assert!(err.current_context().is_retryable());
        assert_eq!(h.store.revision().await, 1);
        assert_eq!(h.store.get("fluidos", &name).await.unwrap(), created);
    }

    #[test(tokio::test)]
    async fn deleted_node_leaves_its_flavor_alone() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "1")).await;
        let ReconcileOutcome::Created { name } = h.reconciler.reconcile("worker-1").await.unwrap()
        else {
            panic!("expected a new flavor");
        };

        h.nodes.remove_node("worker-1").await;
        assert_eq!(
            h.reconciler.reconcile("worker-1").await.unwrap(),
            ReconcileOutcome::NodeNotFound
        );
        assert_eq!(h.store.revision().await, 1);
        assert!(h.store.get("fluidos", &name).await.is_some());
    }

    #[test(tokio::test)]
    async fn mismatched_usage_is_terminal() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-9", "1")).await;

        let err = h.reconciler.reconcile("worker-1").await.unwrap_err();
        assert_eq!(
            *err.current_context(),
            ReconcileError::IdentityMismatch {
                node: "worker-1".to_string()
            }
        );
        assert!(!err.current_context().is_retryable());
        assert_eq!(h.store.revision().await, 0);
    }

    #[test(tokio::test)]
    async fn missing_identity_is_a_no_op() {
        let h = harness_with(settings(), None, Arc::new(AlwaysReady));
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "1")).await;

        assert_eq!(
            h.reconciler.reconcile("worker-1").await.unwrap(),
            ReconcileOutcome::IdentityUnavailable
        );
        assert_eq!(h.store.revision().await, 0);
    }

    #[test(tokio::test)]
    async fn creates_then_keeps_the_flavor_stable() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "1500m")).await;

        let ReconcileOutcome::Created { name } = h.reconciler.reconcile("worker-1").await.unwrap()
        else {
            panic!("expected a new flavor");
        };
        assert!(name.starts_with("fluidos.eu-k8slice-"));

        let created = h.store.get("fluidos", &name).await.unwrap();
        assert_eq!(created.spec.provider_id, "provider-1");
        assert_eq!(
            slice_of(&created).characteristics.cpu,
            Quantity::parse("2500m").unwrap()
        );

        assert_eq!(
            h.reconciler.reconcile("worker-1").await.unwrap(),
            ReconcileOutcome::Unchanged { name: name.clone() }
        );
        assert_eq!(h.store.revision().await, 1);

        // Usage changes do not touch the advertised capacity.
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "3")).await;
        assert_eq!(
            h.reconciler.reconcile("worker-1").await.unwrap(),
            ReconcileOutcome::Unchanged { name }
        );
    }

    #[test(tokio::test)]
    async fn hardware_changes_update_the_flavor() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "1")).await;
        let ReconcileOutcome::Created { name } = h.reconciler.reconcile("worker-1").await.unwrap()
        else {
            panic!("expected a new flavor");
        };

        let mut upgraded = node("worker-1", true);
        upgraded.annotations_mut().extend([
            ("gpu.fluidos.eu/model".to_string(), "a100".to_string()),
            ("gpu.fluidos.eu/count".to_string(), "2".to_string()),
        ]);
        h.nodes.insert_node(upgraded).await;

        assert_eq!(
            h.reconciler.reconcile("worker-1").await.unwrap(),
            ReconcileOutcome::Updated { name: name.clone() }
        );
        let updated = h.store.get("fluidos", &name).await.unwrap();
        let gpu = slice_of(&updated).characteristics.gpu.unwrap();
        assert_eq!(gpu.model, "a100");
        assert_eq!(gpu.count, 2);
    }

    #[test(tokio::test)]
    async fn only_node_owned_flavors_are_considered() {
        let h = harness();
        h.nodes.insert_node(node("worker-1", true)).await;
        h.nodes.insert_metrics("worker-1", metrics("worker-1", "1")).await;

        let foreign = Flavor {
            metadata: ObjectMeta {
                name: Some("foreign".to_string()),
                namespace: Some("fluidos".to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "reservation.fluidos.eu/v1alpha1".to_string(),
                    kind: "Reservation".to_string(),
                    name: "worker-1".to_string(),
                    uid: "uid-r".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: FlavorSpec::default(),
        };
        h.store.create(&foreign).await.unwrap();

        let outcome = h.reconciler.reconcile("worker-1").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
        assert_eq!(h.store.get("fluidos", "foreign").await.unwrap(), {
            let mut stored = foreign;
            stored.metadata.resource_version = Some("1".to_string());
            stored.metadata.uid = Some("flavor-1".to_string());
            stored
        });
    }

    #[test]
    fn first_node_owned_candidate_wins() {
        let owned = |name: &str, kind: &str| Flavor {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                owner_references: Some(vec![OwnerReference {
                    kind: kind.to_string(),
                    name: "worker-1".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: FlavorSpec::default(),
        };
        let candidates = vec![
            owned("reserved", "Reservation"),
            owned("first", "Node"),
            owned("second", "Node"),
        ];

        let selected = select_owned_flavor(&candidates).unwrap();
        assert_eq!(selected.name_any(), "first");
        assert!(select_owned_flavor(&candidates[..1]).is_none());
    }
}
