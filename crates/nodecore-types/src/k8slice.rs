//! Payload schema for flavors tagged `K8Slice`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::quantity::Quantity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct K8Slice {
    pub characteristics: Characteristics,
    pub properties: Properties,
    pub policies: Policies,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Characteristics {
    pub architecture: String,
    pub cpu: Quantity,
    pub memory: Quantity,
    pub pods: Quantity,
    /// `None` for nodes without GPU annotations. The key is then omitted on
    /// the wire instead of carrying a zero-valued GPU object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu: Option<Gpu>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Quantity>,
}

/// GPU characteristics advertised with a slice. `memory` and `cores` are
/// totals across all `count` devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Gpu {
    pub vendor: String,
    pub model: String,
    pub count: i64,
    pub tier: String,
    pub memory: Quantity,
    pub cores: Quantity,
    pub multi_instance: bool,
    pub shared: bool,
    pub sharing_strategy: String,
    pub dedicated: bool,
    pub interruptible: bool,
    pub network_bandwidth: Quantity,
    pub network_latency_ms: i64,
    pub network_tier: String,
    pub training_score: f64,
    pub inference_score: f64,
    pub hpc_score: f64,
    pub graphics_score: f64,
    pub architecture: String,
    pub interconnect: String,
    pub interconnect_bandwidth: Quantity,
    pub compute_capability: String,
    pub clock_speed: Quantity,
    #[serde(rename = "fp32TFlops")]
    pub fp32_tflops: f64,
    pub topology: String,
    pub multi_gpu_efficiency: String,
    pub region: String,
    pub zone: String,
    pub hourly_rate: f64,
    pub provider: String,
    pub pre_emptible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Properties {
    #[serde(skip_serializing_if = "is_zero")]
    pub latency: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_standards: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbon_footprint: Option<CarbonFootprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_authorizations: Option<NetworkAuthorizations>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonFootprint {
    pub embodied: i32,
    pub operational: Vec<i32>,
}

/// Communication rules a consumer must honour. Intents are kept verbatim;
/// this layer only carries them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkAuthorizations {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub denied_communications: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mandatory_communications: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    pub partitionability: Partitionability,
}

/// How finely the offered capacity may be subdivided by a consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Partitionability {
    pub cpu_min: Quantity,
    pub memory_min: Quantity,
    pub pods_min: Quantity,
    pub cpu_step: Quantity,
    pub memory_step: Quantity,
    pub pods_step: Quantity,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &i32) -> bool {
    *value == 0
}
