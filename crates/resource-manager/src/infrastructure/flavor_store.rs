use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use kube::api::ListParams;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use kube::ResourceExt;
use nodecore_types::Flavor;

use crate::domain::error::StoreError;
use crate::domain::traits::FlavorStore;

const CONFLICT: u16 = 409;

/// Flavors stored as custom resources.
///
/// The owner-name lookup lists flavors in every namespace and keeps the ones
/// whose owner references carry the name.
#[derive(Clone)]
pub struct KubeFlavorStore {
    client: Client,
}

impl KubeFlavorStore {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced(&self, flavor: &Flavor) -> Api<Flavor> {
        match flavor.namespace() {
            Some(namespace) => Api::namespaced(self.client.clone(), &namespace),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

fn map_write_error(
    result: Result<Flavor, kube::Error>,
    name: String,
    operation: &'static str,
) -> Result<Flavor, Report<StoreError>> {
    match result {
        Ok(flavor) => Ok(flavor),
        Err(kube::Error::Api(api_err)) if api_err.code == CONFLICT => {
            Err(Report::new(StoreError::Conflict { name }).attach_printable(api_err.message))
        }
        Err(e) => Err(Report::new(e).change_context(StoreError::Backend { operation })),
    }
}

#[async_trait]
impl FlavorStore for KubeFlavorStore {
    async fn list_by_owner_name(&self, owner: &str) -> Result<Vec<Flavor>, Report<StoreError>> {
        let flavors = Api::<Flavor>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .change_context(StoreError::Backend {
                operation: "list flavors",
            })?;

        Ok(flavors
            .items
            .into_iter()
            .filter(|flavor| flavor.owner_index_keys().iter().any(|key| key == owner))
            .collect())
    }

    async fn create(&self, flavor: &Flavor) -> Result<Flavor, Report<StoreError>> {
        let result = self
            .namespaced(flavor)
            .create(&PostParams::default(), flavor)
            .await;
        map_write_error(result, flavor.name_any(), "create a flavor")
    }

    async fn replace(&self, flavor: &Flavor) -> Result<Flavor, Report<StoreError>> {
        let name = flavor.name_any();
        let result = self
            .namespaced(flavor)
            .replace(&name, &PostParams::default(), flavor)
            .await;
        map_write_error(result, name, "replace a flavor")
    }
}
