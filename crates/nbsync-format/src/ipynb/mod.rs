//! nbformat (`.ipynb`) serializer
//!
//! Reads nbformat 3 and 4, writes the configured major version. Identity
//! fields that nbformat has no slot for live under reserved metadata keys:
//!
//! | Model field | nbformat 3 | nbformat 4 |
//! |---|---|---|
//! | notebook id | `metadata.id` | `metadata.id` |
//! | worksheet id/name | worksheet `metadata.id` / `metadata.name` | `metadata.worksheet` |
//! | cell id | cell `metadata.id` | cell `id` |
//! | prompt that is not a plain count | cell `metadata.prompt` | cell `metadata.prompt` |
//!
//! Reserved keys are stripped on parse so they never leak into model
//! metadata. nbformat 3 output objects also keep their full bundle and
//! metadata, so every model nbsync writes reads back unchanged.

use crate::error::{FormatError, FormatResult};
use crate::serializer::NotebookSerializer;
use nbsync_model::{validate_reserved, Metadata, Notebook};
use serde_json::{Map, Value};
use std::collections::HashSet;

mod v3;
mod v4;

/// Reserved metadata key holding notebook, worksheet and (v3) cell ids
pub(crate) const ID_KEY: &str = "id";

/// Reserved cell metadata key holding a prompt with no numeric form
pub(crate) const PROMPT_KEY: &str = "prompt";

/// Reserved worksheet metadata key holding the display name (v3)
pub(crate) const NAME_KEY: &str = "name";

/// Reserved notebook metadata key holding worksheet identity (v4)
pub(crate) const WORKSHEET_KEY: &str = "worksheet";

/// Output metadata key carrying `ename`/`evalue`/`traceback`
pub const ERROR_DETAILS_KEY: &str = "errorDetails";

/// nbformat major version to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum IpynbVersion {
    #[default]
    #[serde(rename = "3")]
    V3,
    #[serde(rename = "4")]
    V4,
}

impl IpynbVersion {
    #[must_use]
    pub fn major(self) -> u64 {
        match self {
            IpynbVersion::V3 => 3,
            IpynbVersion::V4 => 4,
        }
    }
}

impl TryFrom<u64> for IpynbVersion {
    type Error = FormatError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(IpynbVersion::V3),
            4 => Ok(IpynbVersion::V4),
            other => Err(FormatError::UnsupportedVersion(other)),
        }
    }
}

/// `.ipynb` serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct IpynbSerializer {
    write_version: IpynbVersion,
}

impl IpynbSerializer {
    #[inline]
    #[must_use]
    pub fn new(write_version: IpynbVersion) -> Self {
        Self { write_version }
    }

    #[inline]
    #[must_use]
    pub fn write_version(&self) -> IpynbVersion {
        self.write_version
    }
}

impl NotebookSerializer for IpynbSerializer {
    fn parse(&self, raw: &[u8]) -> FormatResult<Notebook> {
        let root: Value = serde_json::from_slice(raw)?;
        let version = root
            .get("nbformat")
            .and_then(Value::as_u64)
            .ok_or_else(|| FormatError::structure("missing 'nbformat' version"))?;

        let notebook = match IpynbVersion::try_from(version)? {
            IpynbVersion::V3 => v3::parse_notebook(&root)?,
            IpynbVersion::V4 => v4::parse_notebook(&root)?,
        };

        notebook
            .check_invariants()
            .map_err(|e| FormatError::structure(e.to_string()))?;
        Ok(notebook)
    }

    fn stringify(&self, notebook: &Notebook) -> FormatResult<Vec<u8>> {
        let root = match self.write_version {
            IpynbVersion::V3 => v3::notebook_to_value(notebook)?,
            IpynbVersion::V4 => v4::notebook_to_value(notebook)?,
        };
        let mut bytes =
            serde_json::to_vec_pretty(&root).map_err(|e| FormatError::Encode(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn extensions(&self) -> &[&str] {
        &["ipynb"]
    }

    fn name(&self) -> &'static str {
        "ipynb"
    }

    fn priority(&self) -> i32 {
        10
    }
}

/// nbformat 3 short output keys and their MIME types
const SHORT_MIME_KEYS: &[(&str, &str)] = &[
    ("text", "text/plain"),
    ("html", "text/html"),
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("latex", "text/latex"),
    ("json", "application/json"),
    ("javascript", "application/javascript"),
];

pub(crate) fn mime_for_short_key(key: &str) -> Option<&'static str> {
    SHORT_MIME_KEYS
        .iter()
        .find(|(short, _)| *short == key)
        .map(|(_, mime)| *mime)
}

pub(crate) fn short_key_for_mime(mime: &str) -> Option<&'static str> {
    SHORT_MIME_KEYS
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(short, _)| *short)
}

/// Split text into nbformat lines, each keeping its trailing newline
pub(crate) fn split_lines(text: &str) -> Value {
    Value::Array(
        text.split_inclusive('\n')
            .map(|line| Value::String(line.to_string()))
            .collect(),
    )
}

/// Join an nbformat multiline field (string or array of strings)
pub(crate) fn join_text(value: Option<&Value>, field: &str) -> FormatResult<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Array(lines)) => lines
            .iter()
            .map(|line| {
                line.as_str().ok_or_else(|| {
                    FormatError::structure(format!("'{field}' lines must be strings"))
                })
            })
            .collect(),
        Some(_) => Err(FormatError::structure(format!(
            "'{field}' must be a string or list of strings"
        ))),
    }
}

/// JSON object → model metadata (missing → empty)
pub(crate) fn metadata_from(value: Option<&Value>) -> FormatResult<Metadata> {
    match value {
        None | Some(Value::Null) => Ok(Metadata::new()),
        Some(v @ Value::Object(_)) => Ok(serde_json::from_value(v.clone())?),
        Some(_) => Err(FormatError::structure("metadata must be an object")),
    }
}

/// Model metadata → JSON object
pub(crate) fn metadata_to(metadata: &Metadata) -> FormatResult<Map<String, Value>> {
    match serde_json::to_value(metadata).map_err(|e| FormatError::Encode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(FormatError::Encode("metadata did not encode as an object".into())),
    }
}

/// Remove a reserved string key from metadata
pub(crate) fn take_string(metadata: &mut Metadata, key: &str) -> Option<String> {
    match metadata.remove(key) {
        Some(nbsync_model::MetadataValue::String(s)) => Some(s),
        Some(other) => {
            // Not ours; put it back untouched
            metadata.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

pub(crate) fn as_object<'a>(value: &'a Value, what: &str) -> FormatResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| FormatError::structure(format!("{what} must be an object")))
}

pub(crate) fn as_array<'a>(value: Option<&'a Value>, what: &str) -> FormatResult<&'a [Value]> {
    match value {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(FormatError::structure(format!("{what} must be a list"))),
    }
}

/// Assigns ids, replacing missing or repeated ones
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    /// Keep `preferred` if unused, otherwise `fallback`, otherwise a fresh UUID
    pub(crate) fn claim(&mut self, preferred: Option<String>, fallback: impl Into<String>) -> String {
        let fallback = fallback.into();
        let id = preferred
            .filter(|id| !id.is_empty() && !self.taken.contains(id))
            .or_else(|| (!self.taken.contains(&fallback)).then_some(fallback))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.taken.insert(id.clone());
        id
    }
}

/// Prompt as an execution count, if the number prints back as the same text
pub(crate) fn execution_count(prompt: &str) -> Option<u64> {
    prompt.parse::<u64>().ok().filter(|n| n.to_string() == prompt)
}

/// Reserved cell keys read from a file must hold the documented types
pub(crate) fn check_cell_metadata(cell_id: &str, metadata: &Metadata) -> FormatResult<()> {
    validate_reserved(metadata)
        .map_err(|e| FormatError::structure(format!("cell '{cell_id}': {e}")))
}

/// Display text for an error output
pub(crate) fn error_text(ename: &str, evalue: &str) -> String {
    if ename.is_empty() {
        evalue.to_string()
    } else {
        format!("{ename}: {evalue}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_and_join_lines() {
        let lines = split_lines("a\nb\n\nc");
        assert_eq!(lines, json!(["a\n", "b\n", "\n", "c"]));
        assert_eq!(join_text(Some(&lines), "source").unwrap(), "a\nb\n\nc");

        assert_eq!(split_lines(""), json!([]));
        assert_eq!(join_text(Some(&json!([])), "source").unwrap(), "");
        assert_eq!(join_text(None, "source").unwrap(), "");
        assert_eq!(join_text(Some(&json!("x\ny")), "source").unwrap(), "x\ny");
        assert!(join_text(Some(&json!([1])), "source").is_err());
    }

    #[test]
    fn mime_key_table() {
        assert_eq!(mime_for_short_key("png"), Some("image/png"));
        assert_eq!(short_key_for_mime("text/html"), Some("html"));
        assert_eq!(short_key_for_mime("application/vnd.custom"), None);
    }

    #[test]
    fn id_allocator_dedupes() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.claim(Some("a".into()), "ws1"), "a");
        assert_eq!(ids.claim(None, "ws1"), "ws1");
        let third = ids.claim(Some("a".into()), "ws1");
        assert_ne!(third, "a");
        assert_ne!(third, "ws1");
    }

    #[test]
    fn version_detection() {
        let serializer = IpynbSerializer::default();
        let err = serializer.parse(br#"{"nbformat": 2}"#).unwrap_err();
        assert_eq!(err, FormatError::UnsupportedVersion(2));

        let err = serializer.parse(br#"{"cells": []}"#).unwrap_err();
        assert!(matches!(err, FormatError::InvalidStructure(_)));

        let err = serializer.parse(b"not json").unwrap_err();
        assert!(matches!(err, FormatError::Syntax(_)));
    }

    #[test]
    fn execution_count_only_for_canonical_numbers() {
        assert_eq!(execution_count("7"), Some(7));
        assert_eq!(execution_count("0"), Some(0));
        assert_eq!(execution_count("03"), None);
        assert_eq!(execution_count("*"), None);
        assert_eq!(execution_count(" 1"), None);
        assert_eq!(execution_count("+1"), None);
    }

    #[test]
    fn storage_keys_match_model() {
        for key in [ID_KEY, PROMPT_KEY] {
            assert!(nbsync_model::STORAGE_CELL_KEYS.contains(&key));
        }
    }

    #[test]
    fn version_serde_names() {
        let v: IpynbVersion = serde_json::from_value(json!("4")).unwrap();
        assert_eq!(v, IpynbVersion::V4);
        assert_eq!(v.major(), 4);
    }
}
