pub mod flavor_store;
pub mod identity;
pub mod kube_client;
pub mod logging;
pub mod memory;
pub mod node_source;
pub mod readiness;

pub use flavor_store::KubeFlavorStore;
pub use identity::ConfigMapIdentityProvider;
pub use memory::InMemoryFlavorStore;
pub use memory::InMemoryNodeSource;
pub use memory::StaticIdentityProvider;
pub use node_source::KubeNodeSource;
pub use readiness::AlwaysReady;
pub use readiness::EndpointsReadiness;
