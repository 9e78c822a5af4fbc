//! The `Flavor` custom resource: a persisted, externally advertised offer.

use core::error::Error;

use error_stack::Report;
use error_stack::ResultExt;
use kube::CustomResource;
use kube::ResourceExt;
use schemars::gen::SchemaGenerator;
use schemars::schema::InstanceType;
use schemars::schema::Schema;
use schemars::schema::SchemaObject;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::identity::NodeIdentity;
use crate::k8slice::K8Slice;

/// Kind recorded in the owner reference that ties a flavor to its node.
pub const NODE_OWNER_KIND: &str = "Node";

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "nodecore.fluidos.eu",
    version = "v1alpha1",
    kind = "Flavor",
    namespaced,
    shortname = "fl",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct FlavorSpec {
    pub flavor_type: FlavorType,
    pub owner: NodeIdentity,
    #[serde(rename = "providerID")]
    pub provider_id: String,
    pub availability: bool,
    pub network_property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub price: Price,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum FlavorTypeIdentifier {
    #[default]
    K8Slice,
    VM,
    Service,
    Sensor,
}

impl std::fmt::Display for FlavorTypeIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Type tag plus an opaque payload whose schema depends on the tag.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlavorType {
    pub type_identifier: FlavorTypeIdentifier,
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub type_data: serde_json::Value,
}

/// A decoded flavor payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FlavorTypeData {
    K8Slice(K8Slice),
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum FlavorTypeError {
    #[display("failed to encode {type_identifier} payload")]
    Encode {
        type_identifier: FlavorTypeIdentifier,
    },
    #[display("failed to decode {type_identifier} payload")]
    Decode {
        type_identifier: FlavorTypeIdentifier,
    },
    #[display("flavor type {type_identifier} has no payload schema")]
    Unsupported {
        type_identifier: FlavorTypeIdentifier,
    },
}

impl Error for FlavorTypeError {}

impl FlavorType {
    /// Encode a K8Slice payload under the `K8Slice` tag.
    ///
    /// # Errors
    ///
    /// - [`FlavorTypeError::Encode`] if the payload cannot be serialized
    pub fn from_k8slice(slice: &K8Slice) -> Result<Self, Report<FlavorTypeError>> {
        FlavorTypeData::K8Slice(slice.clone()).encode()
    }

    /// Decode the opaque payload according to the type tag. An absent
    /// payload decodes to the zero value of the tagged schema.
    ///
    /// # Errors
    ///
    /// - [`FlavorTypeError::Decode`] if the payload does not match the schema
    /// - [`FlavorTypeError::Unsupported`] for tags without a payload schema
    pub fn decode(&self) -> Result<FlavorTypeData, Report<FlavorTypeError>> {
        let type_identifier = self.type_identifier;
        match type_identifier {
            FlavorTypeIdentifier::K8Slice if self.type_data.is_null() => {
                Ok(FlavorTypeData::K8Slice(K8Slice::default()))
            }
            FlavorTypeIdentifier::K8Slice => serde_json::from_value(self.type_data.clone())
                .map(FlavorTypeData::K8Slice)
                .change_context(FlavorTypeError::Decode { type_identifier }),
            _ => Err(Report::new(FlavorTypeError::Unsupported { type_identifier })),
        }
    }
}

impl FlavorTypeData {
    pub const fn type_identifier(&self) -> FlavorTypeIdentifier {
        match self {
            Self::K8Slice(_) => FlavorTypeIdentifier::K8Slice,
        }
    }

    /// # Errors
    ///
    /// - [`FlavorTypeError::Encode`] if the payload cannot be serialized
    pub fn encode(&self) -> Result<FlavorType, Report<FlavorTypeError>> {
        let type_identifier = self.type_identifier();
        let type_data = match self {
            Self::K8Slice(slice) => serde_json::to_value(slice),
        }
        .change_context(FlavorTypeError::Encode { type_identifier })?;

        Ok(FlavorType {
            type_identifier,
            type_data,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct Price {
    pub amount: String,
    pub currency: String,
    pub period: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
    pub country: String,
    pub city: String,
    pub additional_notes: String,
}

impl Flavor {
    /// Every owner-reference name on this flavor. This is the key function
    /// of the "flavors by owner name" index.
    pub fn owner_index_keys(&self) -> Vec<String> {
        self.owner_references()
            .iter()
            .map(|owner| owner.name.clone())
            .collect()
    }

    pub fn has_owner_kind(&self, kind: &str) -> bool {
        self.owner_references()
            .iter()
            .any(|owner| owner.kind == kind)
    }
}

fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}
