//! Node to flavor pipeline.
//!
//! - [`node_info`]: combines a node and its usage snapshot into a [`NodeInfo`]
//! - [`offer`]: merge policy turning a [`NodeInfo`] into a flavor
//! - [`reconciler`]: one reconciliation pass over the collaborators in [`traits`]

pub mod error;
pub mod node_info;
pub mod offer;
pub mod reconciler;
pub mod traits;

pub use error::ReconcileError;
pub use error::StoreError;
pub use node_info::NodeInfo;
pub use node_info::ResourceMetrics;
pub use offer::OfferDefaults;
pub use reconciler::ReconcileOutcome;
pub use reconciler::Reconciler;
pub use reconciler::ReconcilerSettings;
