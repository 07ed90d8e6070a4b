//! Error types for the notebook model
//!
//! - [`NotFoundError`]: a referenced worksheet or cell does not exist
//! - [`ConsistencyError`]: a document invariant no longer holds
//! - [`MetadataError`]: a reserved metadata key holds the wrong kind of value

/// A worksheet or cell referenced by id is absent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    /// Worksheet id is not present in the notebook
    #[error("worksheet '{worksheet_id}' not found in notebook '{notebook_id}'")]
    Worksheet {
        worksheet_id: String,
        notebook_id: String,
    },

    /// Cell id is not present in the worksheet
    #[error("cell '{cell_id}' not found in worksheet '{worksheet_id}' of notebook '{notebook_id}'")]
    Cell {
        cell_id: String,
        worksheet_id: String,
        notebook_id: String,
    },
}

impl NotFoundError {
    /// Create a missing-worksheet error
    #[inline]
    pub fn worksheet(worksheet_id: impl Into<String>, notebook_id: impl Into<String>) -> Self {
        Self::Worksheet {
            worksheet_id: worksheet_id.into(),
            notebook_id: notebook_id.into(),
        }
    }

    /// Create a missing-cell error
    #[inline]
    pub fn cell(
        cell_id: impl Into<String>,
        worksheet_id: impl Into<String>,
        notebook_id: impl Into<String>,
    ) -> Self {
        Self::Cell {
            cell_id: cell_id.into(),
            worksheet_id: worksheet_id.into(),
            notebook_id: notebook_id.into(),
        }
    }

    /// The id that could not be resolved
    #[must_use]
    pub fn missing_id(&self) -> &str {
        match self {
            Self::Worksheet { worksheet_id, .. } => worksheet_id,
            Self::Cell { cell_id, .. } => cell_id,
        }
    }
}

/// A structural invariant of the notebook is violated
///
/// The in-memory document can no longer be trusted once one of these
/// surfaces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    /// Notebook has no worksheets
    #[error("notebook '{notebook_id}' has no worksheets")]
    NoWorksheets { notebook_id: String },

    /// Two worksheets share an id
    #[error("duplicate worksheet id '{worksheet_id}' in notebook '{notebook_id}'")]
    DuplicateWorksheetId {
        worksheet_id: String,
        notebook_id: String,
    },

    /// Two cells in one worksheet share an id
    #[error("duplicate cell id '{cell_id}' in worksheet '{worksheet_id}'")]
    DuplicateCellId {
        cell_id: String,
        worksheet_id: String,
    },
}

/// Reserved metadata key holds an unexpected value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// Wrong value variant for a reserved key
    #[error("metadata key '{key}' must be {expected}, found {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Heading level outside 1..=6
    #[error("heading level {0} is outside 1..=6")]
    LevelOutOfRange(i64),

    /// Key is used by the file format to store a model field
    #[error("metadata key '{0}' is reserved for storage")]
    StorageKey(String),
}

impl MetadataError {
    pub(crate) fn wrong_type(key: &str, expected: &'static str, found: &'static str) -> Self {
        Self::WrongType {
            key: key.to_string(),
            expected,
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_ids() {
        let err = NotFoundError::worksheet("ws9", "nb1");
        assert_eq!(
            err.to_string(),
            "worksheet 'ws9' not found in notebook 'nb1'"
        );
        assert_eq!(err.missing_id(), "ws9");

        let err = NotFoundError::cell("c1", "ws1", "nb1");
        assert!(err.to_string().contains("cell 'c1'"));
        assert_eq!(err.missing_id(), "c1");
    }

    #[test]
    fn metadata_error_display() {
        let err = MetadataError::wrong_type("level", "an integer", "a string");
        assert_eq!(
            err.to_string(),
            "metadata key 'level' must be an integer, found a string"
        );
    }
}
