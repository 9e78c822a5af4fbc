//! Kubernetes-facing model.
//!
//! The main components are:
//! - [`GpuMetrics`]: GPU description characterized from node annotations
//! - [`NodeMetrics`]: the `metrics.k8s.io` usage snapshot of a node
//! - [`KubernetesError`]: failures talking to the API server

pub mod annotations;
pub mod node_metrics;
pub mod types;

pub use annotations::characterize_gpu;
pub use annotations::CharacterizationError;
pub use annotations::GpuMetrics;
pub use node_metrics::NodeMetrics;
pub use types::KubernetesError;

/// Label value that enrolls a node.
pub const LABEL_ENABLED: &str = "true";
