use async_trait::async_trait;
use k8s_openapi::api::core::v1::Endpoints;
use kube::Api;
use kube::Client;
use tracing::warn;

use crate::domain::traits::ReadinessProbe;

/// Ready once the service has at least one ready endpoint address.
#[derive(Clone)]
pub struct EndpointsReadiness {
    endpoints: Api<Endpoints>,
    service: String,
}

impl EndpointsReadiness {
    pub fn new(client: Client, namespace: &str, service: impl Into<String>) -> Self {
        Self {
            endpoints: Api::namespaced(client, namespace),
            service: service.into(),
        }
    }
}

fn has_ready_address(endpoints: &Endpoints) -> bool {
    endpoints.subsets.iter().flatten().any(|subset| {
        subset
            .addresses
            .as_ref()
            .is_some_and(|addresses| !addresses.is_empty())
    })
}

#[async_trait]
impl ReadinessProbe for EndpointsReadiness {
    async fn is_ready(&self) -> bool {
        match self.endpoints.get_opt(&self.service).await {
            Ok(Some(endpoints)) => has_ready_address(&endpoints),
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read endpoints of service {}: {e}", self.service);
                false
            }
        }
    }
}

/// Used when no readiness dependency is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

#[async_trait]
impl ReadinessProbe for AlwaysReady {
    async fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::EndpointAddress;
    use k8s_openapi::api::core::v1::EndpointSubset;

    use super::*;

    #[test]
    fn needs_a_ready_address() {
        let mut endpoints = Endpoints::default();
        assert!(!has_ready_address(&endpoints));

        endpoints.subsets = Some(vec![EndpointSubset {
            not_ready_addresses: Some(vec![EndpointAddress {
                ip: "10.0.0.7".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }]);
        assert!(!has_ready_address(&endpoints));

        endpoints.subsets = Some(vec![EndpointSubset {
            addresses: Some(vec![EndpointAddress {
                ip: "10.0.0.8".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }]);
        assert!(has_ready_address(&endpoints));
    }
}
