use std::sync::Arc;

use anyhow::Result;
use nodecore_types::k8slice::Partitionability;

use crate::app::core::Application;
use crate::app::services::ApplicationServices;
use crate::config::ControllerArgs;
use crate::domain::traits::ReadinessProbe;
use crate::domain::OfferDefaults;
use crate::domain::Reconciler;
use crate::domain::ReconcilerSettings;
use crate::infrastructure::kube_client::init_kube_client;
use crate::infrastructure::AlwaysReady;
use crate::infrastructure::ConfigMapIdentityProvider;
use crate::infrastructure::EndpointsReadiness;
use crate::infrastructure::KubeFlavorStore;
use crate::infrastructure::KubeNodeSource;

/// Application builder
pub struct ApplicationBuilder {
    args: ControllerArgs,
}

impl ApplicationBuilder {
    pub const fn new(args: ControllerArgs) -> Self {
        Self { args }
    }

    /// Build complete application
    pub async fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let client = init_kube_client(self.args.kubeconfig.clone())
            .await
            .map_err(|report| anyhow::anyhow!("{report:?}"))?;

        let readiness: Arc<dyn ReadinessProbe> = match &self.args.readiness_service {
            Some(service) => {
                tracing::info!("Waiting on endpoints of service {service}");
                Arc::new(EndpointsReadiness::new(
                    client.clone(),
                    &self.args.namespace,
                    service,
                ))
            }
            None => Arc::new(AlwaysReady),
        };

        let reconciler = Reconciler::new(
            self.settings(),
            Arc::new(KubeNodeSource::new(client.clone())),
            Arc::new(KubeFlavorStore::new(client.clone())),
            Arc::new(ConfigMapIdentityProvider::new(
                client.clone(),
                &self.args.namespace,
                self.args.identity_config_map.clone(),
            )),
            readiness,
        );

        let services = ApplicationServices {
            client,
            reconciler: Arc::new(reconciler),
        };
        Ok(Application::new(services, self.args))
    }

    fn settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            enable_auto_discovery: self.args.enable_auto_discovery,
            resource_node_label: self.args.resource_node_label.clone(),
            namespace: self.args.namespace.clone(),
            offer_defaults: OfferDefaults::from(&self.args),
            partitionability: Partitionability::from(&self.args),
        }
    }
}
