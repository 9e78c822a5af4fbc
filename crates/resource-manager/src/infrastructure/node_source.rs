use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Node;
use kube::Api;
use kube::Client;

use crate::domain::traits::NodeSource;
use crate::k8s::KubernetesError;
use crate::k8s::NodeMetrics;

/// Nodes from the API server, usage from the `metrics.k8s.io` API.
#[derive(Clone)]
pub struct KubeNodeSource {
    nodes: Api<Node>,
    metrics: Api<NodeMetrics>,
}

impl KubeNodeSource {
    pub fn new(client: Client) -> Self {
        Self {
            nodes: Api::all(client.clone()),
            metrics: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeSource for KubeNodeSource {
    async fn node(&self, name: &str) -> Result<Option<Node>, Report<KubernetesError>> {
        self.nodes
            .get_opt(name)
            .await
            .change_context_lazy(|| KubernetesError::GetFailed {
                kind: "Node",
                name: name.to_string(),
            })
    }

    async fn node_metrics(&self, name: &str) -> Result<NodeMetrics, Report<KubernetesError>> {
        self.metrics
            .get(name)
            .await
            .change_context_lazy(|| KubernetesError::GetFailed {
                kind: "NodeMetrics",
                name: name.to_string(),
            })
    }
}
