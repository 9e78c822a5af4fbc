use std::borrow::Cow;
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ClusterResourceScope;
use serde::Deserialize;
use serde::Serialize;

/// Usage snapshot of a node as served by the `metrics.k8s.io` API.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct NodeMetrics {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    /// Resource name (`cpu`, `memory`, ...) to the amount in use.
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

impl kube::Resource for NodeMetrics {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn group(_dt: &()) -> Cow<'_, str> {
        "metrics.k8s.io".into()
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        "v1beta1".into()
    }

    fn kind(_dt: &()) -> Cow<'_, str> {
        "NodeMetrics".into()
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        "nodes".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
