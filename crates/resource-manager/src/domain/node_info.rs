use core::error::Error;
use std::collections::BTreeMap;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use kube::ResourceExt;
use nodecore_types::Quantity;

use crate::k8s::characterize_gpu;
use crate::k8s::GpuMetrics;
use crate::k8s::NodeMetrics;

const CPU: &str = "cpu";
const MEMORY: &str = "memory";
const PODS: &str = "pods";
const EPHEMERAL_STORAGE: &str = "ephemeral-storage";

/// Snapshot of a node built fresh on every pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInfo {
    pub uid: String,
    pub name: String,
    pub architecture: String,
    pub operating_system: String,
    pub resource_metrics: ResourceMetrics,
}

/// Allocatable and available capacity of a node.
///
/// `*_available` is allocatable minus usage and goes negative when usage
/// exceeds allocatable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMetrics {
    pub cpu_total: Quantity,
    pub cpu_available: Quantity,
    pub memory_total: Quantity,
    pub memory_available: Quantity,
    pub pods_total: Quantity,
    pub pods_available: Quantity,
    /// Ephemeral storage in use, as reported.
    pub ephemeral_storage: Quantity,
    pub gpu: GpuMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum NodeInfoError {
    #[display("Node {node} and usage snapshot {metrics} do not match")]
    IdentityMismatch { node: String, metrics: String },
    #[display("Malformed {resource} quantity on node {node}")]
    MalformedQuantity { node: String, resource: String },
    #[display("Failed to characterize GPUs of node {node}")]
    Characterization { node: String },
}

impl Error for NodeInfoError {}

/// Combine a node and its usage snapshot into a [`NodeInfo`].
///
/// # Errors
///
/// - [`NodeInfoError::IdentityMismatch`] if the snapshot belongs to another node
/// - [`NodeInfoError::MalformedQuantity`] if a capacity or usage quantity does not parse
/// - [`NodeInfoError::Characterization`] if the GPU annotations are malformed
pub fn node_info(node: &Node, metrics: &NodeMetrics) -> Result<NodeInfo, Report<NodeInfoError>> {
    let name = node.name_any();
    let metrics_name = metrics.metadata.name.clone().unwrap_or_default();
    if name != metrics_name {
        return Err(Report::new(NodeInfoError::IdentityMismatch {
            node: name,
            metrics: metrics_name,
        }));
    }

    let empty = BTreeMap::new();
    let allocatable = node
        .status
        .as_ref()
        .and_then(|status| status.allocatable.as_ref())
        .unwrap_or(&empty);
    let usage = &metrics.usage;

    let capacity = |resource: &str| -> Result<(Quantity, Quantity), Report<NodeInfoError>> {
        let total = quantity(&name, allocatable, resource)?;
        let used = quantity(&name, usage, resource)?;
        let available = total
            .checked_sub(&used)
            .change_context_lazy(|| malformed(&name, resource))?;
        Ok((total, available))
    };

    let (cpu_total, cpu_available) = capacity(CPU)?;
    let (memory_total, memory_available) = capacity(MEMORY)?;
    let (pods_total, pods_available) = capacity(PODS)?;
    let ephemeral_storage = quantity(&name, usage, EPHEMERAL_STORAGE)?;

    let gpu = characterize_gpu(node.annotations())
        .change_context_lazy(|| NodeInfoError::Characterization { node: name.clone() })?;

    let node_info = node.status.as_ref().and_then(|status| status.node_info.as_ref());

    Ok(NodeInfo {
        uid: node.uid().unwrap_or_default(),
        architecture: node_info
            .map(|info| info.architecture.clone())
            .unwrap_or_default(),
        operating_system: node_info
            .map(|info| info.operating_system.clone())
            .unwrap_or_default(),
        resource_metrics: ResourceMetrics {
            cpu_total,
            cpu_available,
            memory_total,
            memory_available,
            pods_total,
            pods_available,
            ephemeral_storage,
            gpu,
        },
        name,
    })
}

/// An absent resource counts as zero.
fn quantity(
    node: &str,
    resources: &BTreeMap<String, K8sQuantity>,
    resource: &str,
) -> Result<Quantity, Report<NodeInfoError>> {
    resources.get(resource).map_or_else(
        || Ok(Quantity::zero()),
        |value| Quantity::try_from(value).change_context_lazy(|| malformed(node, resource)),
    )
}

fn malformed(node: &str, resource: &str) -> NodeInfoError {
    NodeInfoError::MalformedQuantity {
        node: node.to_string(),
        resource: resource.to_string(),
    }
}
