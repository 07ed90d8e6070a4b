//! Notebook document types
//!
//! Field names serialize in camelCase; this is the shape carried by
//! snapshot updates and by the native JSON format.

use crate::error::MetadataError;
use crate::metadata::{Metadata, MetadataValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Id of the single worksheet in a starter notebook
pub const STARTER_WORKSHEET_ID: &str = "ws1";

/// Display name of the starter worksheet
pub const STARTER_WORKSHEET_NAME: &str = "Untitled";

/// MIME type → rendered content
pub type MimetypeBundle = BTreeMap<String, String>;

/// Top-level notebook document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub worksheets: Vec<Worksheet>,
}

impl Notebook {
    /// Create notebook with the given id and worksheets
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, worksheets: Vec<Worksheet>) -> Self {
        Self {
            id: id.into(),
            metadata: Metadata::new(),
            worksheets,
        }
    }

    /// Fresh notebook: random id, one empty worksheet
    #[must_use]
    pub fn starter() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            vec![Worksheet::new(STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME)],
        )
    }

    /// Notebook display name, if set in metadata
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(MetadataValue::as_str)
    }

    /// Total number of cells across worksheets
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.worksheets.iter().map(|ws| ws.cells.len()).sum()
    }
}

/// Ordered list of cells within a notebook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worksheet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl Worksheet {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metadata: Metadata::new(),
            cells: Vec::new(),
        }
    }

    /// Builder: append a cell
    #[inline]
    #[must_use]
    pub fn with_cell(mut self, cell: Cell) -> Self {
        self.cells.push(cell);
        self
    }
}

/// Cell kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Heading,
    Raw,
}

impl CellType {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Heading => "heading",
            CellType::Raw => "raw",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(CellType::Code),
            "markdown" => Ok(CellType::Markdown),
            "heading" => Ok(CellType::Heading),
            "raw" => Ok(CellType::Raw),
            other => Err(format!("unknown cell type: {other}")),
        }
    }
}

/// Single editable unit of a worksheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub id: String,
    #[serde(rename = "type")]
    pub cell_type: CellType,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<CellOutput>,
    /// Execution counter or busy marker; a render hint only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Cell {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, cell_type: CellType, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cell_type,
            metadata: Metadata::new(),
            source: source.into(),
            outputs: Vec::new(),
            prompt: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: CellOutput) -> Self {
        self.outputs.push(output);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Kernel language from reserved `language` key
    ///
    /// # Errors
    /// Fails if the key is present but not a string
    pub fn language(&self) -> Result<Option<&str>, MetadataError> {
        match self.metadata.get("language") {
            None => Ok(None),
            Some(MetadataValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(MetadataError::wrong_type(
                "language",
                "a string",
                other.kind(),
            )),
        }
    }

    /// Heading level from reserved `level` key
    ///
    /// # Errors
    /// Fails if the key is not an integer in 1..=6
    pub fn heading_level(&self) -> Result<Option<u8>, MetadataError> {
        match self.metadata.get("level") {
            None => Ok(None),
            Some(MetadataValue::Int(n)) => u8::try_from(*n)
                .ok()
                .filter(|level| (1..=6).contains(level))
                .map(Some)
                .ok_or(MetadataError::LevelOutOfRange(*n)),
            Some(other) => Err(MetadataError::wrong_type(
                "level",
                "an integer",
                other.kind(),
            )),
        }
    }

    /// Reserved `collapsed` flag, `false` when absent
    ///
    /// # Errors
    /// Fails if the key is present but not a boolean
    pub fn is_collapsed(&self) -> Result<bool, MetadataError> {
        match self.metadata.get("collapsed") {
            None => Ok(false),
            Some(MetadataValue::Bool(b)) => Ok(*b),
            Some(other) => Err(MetadataError::wrong_type(
                "collapsed",
                "a boolean",
                other.kind(),
            )),
        }
    }
}

/// Output kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Result,
    Error,
    Stdout,
    Stderr,
}

/// One output of an executed cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellOutput {
    #[serde(rename = "type")]
    pub output_type: OutputType,
    #[serde(default)]
    pub mimetype_bundle: MimetypeBundle,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl CellOutput {
    #[inline]
    #[must_use]
    pub fn new(output_type: OutputType) -> Self {
        Self {
            output_type,
            mimetype_bundle: MimetypeBundle::new(),
            metadata: Metadata::new(),
        }
    }

    /// Output with a single `text/plain` entry
    #[must_use]
    pub fn text(output_type: OutputType, text: impl Into<String>) -> Self {
        Self::new(output_type).with_mime("text/plain", text)
    }

    #[inline]
    #[must_use]
    pub fn with_mime(mut self, mimetype: impl Into<String>, content: impl Into<String>) -> Self {
        self.mimetype_bundle.insert(mimetype.into(), content.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `text/plain` content, if any
    #[must_use]
    pub fn plain_text(&self) -> Option<&str> {
        self.mimetype_bundle.get("text/plain").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn cell_serializes_minimal_shape() {
        let cell = Cell::new("c1", CellType::Code, "1+1");
        let value = serde_json::to_value(&cell).unwrap();
        assert_eq!(value, json!({"id": "c1", "type": "code", "source": "1+1"}));
    }

    #[test]
    fn output_serializes_bundle() {
        let output = CellOutput::text(OutputType::Stdout, "2");
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(
            value,
            json!({"type": "stdout", "mimetypeBundle": {"text/plain": "2"}})
        );
        let back: CellOutput = serde_json::from_value(value).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn cell_type_parse() {
        assert_eq!("heading".parse::<CellType>(), Ok(CellType::Heading));
        assert!("widget".parse::<CellType>().is_err());
        assert_eq!(CellType::Raw.to_string(), "raw");
    }

    #[test]
    fn reserved_accessors() {
        let cell = Cell::new("h", CellType::Heading, "Intro")
            .with_metadata("level", 2i64)
            .with_metadata("collapsed", true)
            .with_metadata("language", "python");

        assert_eq!(cell.heading_level(), Ok(Some(2)));
        assert_eq!(cell.is_collapsed(), Ok(true));
        assert_eq!(cell.language(), Ok(Some("python")));

        let bad = Cell::new("h", CellType::Heading, "").with_metadata("level", 0i64);
        assert_eq!(bad.heading_level(), Err(MetadataError::LevelOutOfRange(0)));

        let plain = Cell::new("m", CellType::Markdown, "");
        assert_eq!(plain.is_collapsed(), Ok(false));
        assert_eq!(plain.language(), Ok(None));
    }

    #[test]
    fn notebook_name_from_metadata() {
        let mut notebook = Notebook::starter();
        assert_eq!(notebook.name(), None);
        notebook.metadata.insert("name".into(), "analysis".into());
        assert_eq!(notebook.name(), Some("analysis"));
    }
}
