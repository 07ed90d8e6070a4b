//! Protocol error types

use nbsync_model::{ConsistencyError, MetadataError, NotFoundError};

/// Errors returned when an action cannot be applied
///
/// Every variant except [`ProtocolError::Consistency`] leaves the notebook
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Action could not be decoded or failed validation
    #[error("malformed action: {0}")]
    MalformedAction(String),

    /// Referenced worksheet, cell or anchor does not exist
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Cell id already present in the target worksheet
    #[error("cell '{cell_id}' already exists in worksheet '{worksheet_id}'")]
    AlreadyExists {
        cell_id: String,
        worksheet_id: String,
    },

    /// Notebook invariant broken after application
    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),
}

impl ProtocolError {
    /// Create malformed-action error
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedAction(message.into())
    }

    /// Create already-exists error
    #[inline]
    pub fn already_exists(cell_id: impl Into<String>, worksheet_id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            cell_id: cell_id.into(),
            worksheet_id: worksheet_id.into(),
        }
    }

    /// Whether the error leaves the document unusable
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

impl From<MetadataError> for ProtocolError {
    fn from(err: MetadataError) -> Self {
        Self::MalformedAction(err.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedAction(err.to_string())
    }
}
