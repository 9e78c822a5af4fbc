//! Filters consumers use to select offers.
//!
//! A raw filter is a `{name, data}` pair where `name` says whether `data`
//! holds a match or a range. Raw filters decode into typed variants, which
//! evaluate candidate values.

use core::error::Error;

use error_stack::Report;
use error_stack::ResultExt;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::k8slice::K8Slice;
use crate::quantity::Quantity;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    Match,
    Range,
}

/// Capability shared by every filter: report which kind it is.
pub trait FilterData {
    fn filter_type(&self) -> FilterType;
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum FilterError {
    #[display("malformed {filter_type:?} filter data")]
    MalformedData { filter_type: FilterType },
    #[display("invalid regex `{regex}`")]
    InvalidRegex { regex: String },
}

impl Error for FilterError {}

fn decode_data<T: DeserializeOwned>(
    filter_type: FilterType,
    data: &serde_json::Value,
) -> Result<T, Report<FilterError>> {
    serde_json::from_value(data.clone()).change_context(FilterError::MalformedData { filter_type })
}

fn within<T: PartialOrd>(value: &T, min: Option<&T>, max: Option<&T>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NumberFilter {
    pub name: FilterType,
    pub data: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NumberMatchFilter {
    pub value: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct NumberRangeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberFilterData {
    Match(NumberMatchFilter),
    Range(NumberRangeFilter),
}

impl FilterData for NumberFilter {
    fn filter_type(&self) -> FilterType {
        self.name
    }
}

impl NumberFilter {
    /// # Errors
    ///
    /// - [`FilterError::MalformedData`] if `data` does not fit `name`
    pub fn decode(&self) -> Result<NumberFilterData, Report<FilterError>> {
        match self.name {
            FilterType::Match => decode_data(self.name, &self.data).map(NumberFilterData::Match),
            FilterType::Range => decode_data(self.name, &self.data).map(NumberFilterData::Range),
        }
    }
}

impl NumberFilterData {
    pub fn matches(&self, value: f64) -> bool {
        match self {
            #[allow(clippy::float_cmp)]
            Self::Match(filter) => value == filter.value,
            Self::Range(filter) => within(&value, filter.min.as_ref(), filter.max.as_ref()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResourceQuantityFilter {
    pub name: FilterType,
    pub data: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceQuantityMatchFilter {
    pub value: Quantity,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceQuantityRangeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Quantity>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceQuantityFilterData {
    Match(ResourceQuantityMatchFilter),
    Range(ResourceQuantityRangeFilter),
}

impl FilterData for ResourceQuantityFilter {
    fn filter_type(&self) -> FilterType {
        self.name
    }
}

impl ResourceQuantityFilter {
    /// # Errors
    ///
    /// - [`FilterError::MalformedData`] if `data` does not fit `name`
    pub fn decode(&self) -> Result<ResourceQuantityFilterData, Report<FilterError>> {
        match self.name {
            FilterType::Match => {
                decode_data(self.name, &self.data).map(ResourceQuantityFilterData::Match)
            }
            FilterType::Range => {
                decode_data(self.name, &self.data).map(ResourceQuantityFilterData::Range)
            }
        }
    }
}

impl ResourceQuantityFilterData {
    pub fn matches(&self, value: &Quantity) -> bool {
        match self {
            Self::Match(filter) => *value == filter.value,
            Self::Range(filter) => within(value, filter.min.as_ref(), filter.max.as_ref()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StringFilter {
    pub name: FilterType,
    pub data: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StringMatchFilter {
    pub value: String,
}

/// A string "range" is the set of strings matched by a regular expression.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StringRangeFilter {
    pub regex: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StringFilterData {
    Match(StringMatchFilter),
    Range(StringRangeFilter),
}

impl FilterData for StringFilter {
    fn filter_type(&self) -> FilterType {
        self.name
    }
}

impl StringFilter {
    /// # Errors
    ///
    /// - [`FilterError::MalformedData`] if `data` does not fit `name`
    pub fn decode(&self) -> Result<StringFilterData, Report<FilterError>> {
        match self.name {
            FilterType::Match => decode_data(self.name, &self.data).map(StringFilterData::Match),
            FilterType::Range => decode_data(self.name, &self.data).map(StringFilterData::Range),
        }
    }
}

impl StringFilterData {
    /// # Errors
    ///
    /// - [`FilterError::InvalidRegex`] if a range filter's pattern does not compile
    pub fn matches(&self, value: &str) -> Result<bool, Report<FilterError>> {
        match self {
            Self::Match(filter) => Ok(value == filter.value),
            Self::Range(filter) => {
                let regex = Regex::new(&filter.regex).change_context(FilterError::InvalidRegex {
                    regex: filter.regex.clone(),
                })?;
                Ok(regex.is_match(value))
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BooleanFilter {
    pub condition: bool,
}

impl FilterData for BooleanFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::Match
    }
}

impl BooleanFilter {
    pub const fn matches(&self, value: bool) -> bool {
        self.condition == value
    }
}

/// Consumer-side selection over K8Slice offers. Absent filters accept
/// everything; a storage filter never accepts a slice without storage.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct K8SliceSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<StringFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<ResourceQuantityFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<ResourceQuantityFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pods: Option<ResourceQuantityFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<ResourceQuantityFilter>,
}

impl K8SliceSelector {
    /// # Errors
    ///
    /// - [`FilterError`] if any filter is malformed
    pub fn matches(&self, slice: &K8Slice) -> Result<bool, Report<FilterError>> {
        let characteristics = &slice.characteristics;

        if let Some(filter) = &self.architecture {
            if !filter.decode()?.matches(&characteristics.architecture)? {
                return Ok(false);
            }
        }

        let quantities = [
            (&self.cpu, Some(&characteristics.cpu)),
            (&self.memory, Some(&characteristics.memory)),
            (&self.pods, Some(&characteristics.pods)),
            (&self.storage, characteristics.storage.as_ref()),
        ];
        for (filter, value) in quantities {
            let Some(filter) = filter else {
                continue;
            };
            let data = filter.decode()?;
            match value {
                Some(value) if data.matches(value) => {}
                _ => return Ok(false),
            }
        }

        Ok(true)
    }
}
