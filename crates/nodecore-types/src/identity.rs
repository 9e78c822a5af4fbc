use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Identity of the provider cluster advertising an offer.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct NodeIdentity {
    pub domain: String,
    #[serde(rename = "nodeID")]
    pub node_id: String,
    #[serde(default)]
    pub ip: String,
}
