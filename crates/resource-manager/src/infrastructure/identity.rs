use std::collections::BTreeMap;

use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use kube::Client;
use nodecore_types::NodeIdentity;
use tracing::debug;

use crate::domain::traits::IdentityProvider;
use crate::k8s::KubernetesError;

const DOMAIN_KEY: &str = "domain";
const NODE_ID_KEY: &str = "nodeID";
const IP_KEY: &str = "ip";

/// Provider identity published in a config map by the network manager.
#[derive(Clone)]
pub struct ConfigMapIdentityProvider {
    config_maps: Api<ConfigMap>,
    name: String,
}

impl ConfigMapIdentityProvider {
    pub fn new(client: Client, namespace: &str, name: impl Into<String>) -> Self {
        Self {
            config_maps: Api::namespaced(client, namespace),
            name: name.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for ConfigMapIdentityProvider {
    async fn identity(&self) -> Result<Option<NodeIdentity>, Report<KubernetesError>> {
        let config_map = self
            .config_maps
            .get_opt(&self.name)
            .await
            .change_context_lazy(|| KubernetesError::GetFailed {
                kind: "ConfigMap",
                name: self.name.clone(),
            })?;

        let Some(config_map) = config_map else {
            debug!("Identity config map {} does not exist yet", self.name);
            return Ok(None);
        };
        Ok(identity_from_data(&config_map.data.unwrap_or_default()))
    }
}

/// Both `domain` and `nodeID` must be present and non-empty.
fn identity_from_data(data: &BTreeMap<String, String>) -> Option<NodeIdentity> {
    let non_empty = |key: &str| data.get(key).filter(|value| !value.is_empty()).cloned();
    Some(NodeIdentity {
        domain: non_empty(DOMAIN_KEY)?,
        node_id: non_empty(NODE_ID_KEY)?,
        ip: data.get(IP_KEY).cloned().unwrap_or_default(),
    })
}
