//! Shared API type definitions
//!
//! This crate holds the persisted model of the node-core API: exact resource
//! quantities, the `Flavor` custom resource with its typed `K8Slice` payload,
//! the provider identity, and the filters consumers use to select offers.

pub mod filters;
pub mod flavor;
pub mod identity;
pub mod k8slice;
pub mod quantity;

pub use flavor::Flavor;
pub use flavor::FlavorSpec;
pub use flavor::FlavorType;
pub use flavor::FlavorTypeData;
pub use flavor::FlavorTypeError;
pub use flavor::FlavorTypeIdentifier;
pub use flavor::Location;
pub use flavor::Price;
pub use flavor::NODE_OWNER_KIND;
pub use identity::NodeIdentity;
pub use k8slice::K8Slice;
pub use quantity::Quantity;
pub use quantity::QuantityError;
pub use quantity::QuantityFormat;
