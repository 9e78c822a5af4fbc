//! Offer synthesis.
//!
//! A flavor is assembled from two field groups:
//! - create-only: capacity, price, availability, network property type and
//!   location. Written once by [`new_document`] and left to whoever manages
//!   the offer afterwards.
//! - always refreshed: architecture, GPU block, partitionability policy,
//!   provider identity and the owner reference to the node. Rewritten by
//!   both [`new_document`] and [`refresh_document`].

use core::error::Error;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use nodecore_types::k8slice::Gpu;
use nodecore_types::k8slice::Partitionability;
use nodecore_types::k8slice::Policies;
use nodecore_types::Flavor;
use nodecore_types::FlavorSpec;
use nodecore_types::FlavorType;
use nodecore_types::FlavorTypeData;
use nodecore_types::FlavorTypeError;
use nodecore_types::FlavorTypeIdentifier;
use nodecore_types::K8Slice;
use nodecore_types::Location;
use nodecore_types::NodeIdentity;
use nodecore_types::Price;
use nodecore_types::NODE_OWNER_KIND;
use tracing::warn;
use uuid::Uuid;

use crate::domain::node_info::NodeInfo;

const NODE_API_VERSION: &str = "v1";

/// Values a new offer starts out with.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferDefaults {
    pub price: Price,
    pub availability: bool,
    pub network_property_type: String,
    pub location: Option<Location>,
}

impl Default for OfferDefaults {
    fn default() -> Self {
        Self {
            price: Price::default(),
            availability: true,
            network_property_type: "networkProperty".to_string(),
            location: None,
        }
    }
}

/// Everything besides the node that goes into an offer.
#[derive(Debug, Clone, Copy)]
pub struct OfferContext<'a> {
    pub identity: &'a NodeIdentity,
    pub namespace: &'a str,
    pub defaults: &'a OfferDefaults,
    pub partitionability: &'a Partitionability,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum OfferError {
    #[display("Failed to encode the payload of flavor {name}")]
    Encode { name: String },
    #[display("Flavor {name} is a {type_identifier} offer, not a K8Slice one")]
    UnsupportedType {
        name: String,
        type_identifier: FlavorTypeIdentifier,
    },
}

impl Error for OfferError {}

/// Name for a new K8Slice offer of the given provider domain.
pub fn flavor_name(domain: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{domain}-k8slice-{}", &suffix[..8]).to_lowercase()
}

/// Build a brand new offer for a node.
///
/// # Errors
///
/// - [`OfferError::Encode`] if the payload cannot be serialized
pub fn new_document(
    name: String,
    info: &NodeInfo,
    ctx: OfferContext<'_>,
) -> Result<Flavor, Report<OfferError>> {
    let defaults = ctx.defaults;
    let mut flavor = Flavor {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(ctx.namespace.to_string()),
            ..Default::default()
        },
        spec: FlavorSpec {
            availability: defaults.availability,
            network_property_type: defaults.network_property_type.clone(),
            location: defaults.location.clone(),
            price: defaults.price.clone(),
            ..Default::default()
        },
    };

    let mut slice = K8Slice::default();
    seed_capacity(&mut slice, info);
    refresh(&mut flavor, slice, info, ctx)?;
    Ok(flavor)
}

/// Merge the current state of a node into an existing offer.
///
/// Create-only fields are carried over untouched. A K8Slice payload that
/// cannot be decoded is replaced by a zero payload; its capacity stays zero.
///
/// # Errors
///
/// - [`OfferError::UnsupportedType`] if the existing offer is not a K8Slice
/// - [`OfferError::Encode`] if the payload cannot be serialized
pub fn refresh_document(
    existing: &Flavor,
    info: &NodeInfo,
    ctx: OfferContext<'_>,
) -> Result<Flavor, Report<OfferError>> {
    let mut flavor = existing.clone();
    if flavor.metadata.namespace.as_deref().map_or(true, str::is_empty) {
        flavor.metadata.namespace = Some(ctx.namespace.to_string());
    }

    let slice = match existing.spec.flavor_type.decode() {
        Ok(FlavorTypeData::K8Slice(slice)) => slice,
        Err(report) => {
            if let FlavorTypeError::Unsupported { type_identifier } = *report.current_context() {
                return Err(report.change_context(OfferError::UnsupportedType {
                    name: existing.metadata.name.clone().unwrap_or_default(),
                    type_identifier,
                }));
            }
            warn!(
                flavor = existing.metadata.name.as_deref().unwrap_or_default(),
                "Discarding undecodable payload: {report:?}"
            );
            K8Slice::default()
        }
    };

    refresh(&mut flavor, slice, info, ctx)?;
    Ok(flavor)
}

fn seed_capacity(slice: &mut K8Slice, info: &NodeInfo) {
    let metrics = &info.resource_metrics;
    let characteristics = &mut slice.characteristics;
    characteristics.cpu = metrics.cpu_available;
    characteristics.memory = metrics.memory_available;
    characteristics.pods = metrics.pods_available;
    characteristics.storage = Some(metrics.ephemeral_storage);
}

fn refresh(
    flavor: &mut Flavor,
    mut slice: K8Slice,
    info: &NodeInfo,
    ctx: OfferContext<'_>,
) -> Result<(), Report<OfferError>> {
    let gpu = &info.resource_metrics.gpu;
    slice.characteristics.architecture = info.architecture.clone();
    slice.characteristics.gpu = (!gpu.is_unknown()).then(|| Gpu::from(gpu));
    slice.policies = Policies {
        partitionability: ctx.partitionability.clone(),
    };

    flavor.spec.flavor_type = FlavorType::from_k8slice(&slice).change_context_lazy(|| {
        OfferError::Encode {
            name: flavor.metadata.name.clone().unwrap_or_default(),
        }
    })?;
    flavor.spec.provider_id = ctx.identity.node_id.clone();
    flavor.spec.owner = ctx.identity.clone();

    upsert_owner_reference(&mut flavor.metadata, node_owner_reference(info));
    Ok(())
}

fn node_owner_reference(info: &NodeInfo) -> OwnerReference {
    OwnerReference {
        api_version: NODE_API_VERSION.to_string(),
        kind: NODE_OWNER_KIND.to_string(),
        name: info.name.clone(),
        uid: info.uid.clone(),
        ..Default::default()
    }
}

/// Replace the reference to the same owner, or append it.
fn upsert_owner_reference(meta: &mut ObjectMeta, owner: OwnerReference) {
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    match references.iter_mut().find(|reference| {
        reference.api_version == owner.api_version
            && reference.kind == owner.kind
            && reference.name == owner.name
    }) {
        Some(reference) => *reference = owner,
        None => references.push(owner),
    }
}
