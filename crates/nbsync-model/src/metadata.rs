//! Typed metadata maps
//!
//! Notebook, worksheet, cell and output metadata are free-form, but values
//! are restricted to a closed set of variants. Reserved cell keys are
//! checked by [`validate_reserved`] wherever metadata enters the system.

use crate::error::MetadataError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata map, ordered by key
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Reserved cell metadata keys with a fixed value type
pub const RESERVED_CELL_KEYS: &[&str] = &["language", "level", "collapsed"];

/// Cell metadata keys that carry model fields in `.ipynb` files; clients
/// may not set them
pub const STORAGE_CELL_KEYS: &[&str] = &["id", "prompt"];

/// A single metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Human-readable variant name for diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "a boolean",
            Self::Int(_) => "an integer",
            Self::Float(_) => "a float",
            Self::String(_) => "a string",
            Self::Array(_) => "an array",
            Self::Map(_) => "a map",
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, MetadataValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<MetadataValue>> for MetadataValue {
    fn from(value: Vec<MetadataValue>) -> Self {
        Self::Array(value)
    }
}

impl From<Metadata> for MetadataValue {
    fn from(value: Metadata) -> Self {
        Self::Map(value)
    }
}

/// Check the reserved cell keys hold values of the documented type
///
/// - `language`: string
/// - `level`: integer in 1..=6
/// - `collapsed`: boolean
///
/// # Errors
/// Returns [`MetadataError`] for the first offending key
pub fn validate_reserved(metadata: &Metadata) -> Result<(), MetadataError> {
    if let Some(value) = metadata.get("language") {
        if value.as_str().is_none() {
            return Err(MetadataError::wrong_type("language", "a string", value.kind()));
        }
    }
    if let Some(value) = metadata.get("level") {
        let level = value
            .as_i64()
            .ok_or_else(|| MetadataError::wrong_type("level", "an integer", value.kind()))?;
        if !(1..=6).contains(&level) {
            return Err(MetadataError::LevelOutOfRange(level));
        }
    }
    if let Some(value) = metadata.get("collapsed") {
        if value.as_bool().is_none() {
            return Err(MetadataError::wrong_type("collapsed", "a boolean", value.kind()));
        }
    }
    Ok(())
}

/// [`validate_reserved`] for metadata sent by a client, which additionally
/// may not use any of [`STORAGE_CELL_KEYS`]
///
/// # Errors
/// [`MetadataError::StorageKey`] or anything [`validate_reserved`] returns
pub fn validate_client_metadata(metadata: &Metadata) -> Result<(), MetadataError> {
    if let Some(key) = STORAGE_CELL_KEYS.iter().find(|key| metadata.contains_key(**key)) {
        return Err(MetadataError::StorageKey((*key).to_string()));
    }
    validate_reserved(metadata)
}
