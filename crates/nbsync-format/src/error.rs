//! Error types for notebook serialization

/// Errors raised while selecting a serializer, parsing or stringifying
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// No serializer registered for the path's extension
    #[error("no serializer registered for extension: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// Input is not well-formed JSON
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Input is JSON but does not have the expected notebook shape
    #[error("invalid notebook structure: {0}")]
    InvalidStructure(String),

    /// nbformat major version this crate cannot read
    #[error("unsupported nbformat version: {0}")]
    UnsupportedVersion(u64),

    /// Producing the output bytes failed
    #[error("encoding failed: {0}")]
    Encode(String),
}

impl FormatError {
    /// Create unsupported-format error for an extension
    #[inline]
    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    /// Create structure error
    #[inline]
    pub fn structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() {
            Self::Syntax(err.to_string())
        } else {
            Self::InvalidStructure(err.to_string())
        }
    }
}

/// Result type alias for serializer operations
pub type FormatResult<T> = Result<T, FormatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_display() {
        let err = FormatError::unsupported("docx");
        assert_eq!(err.to_string(), "no serializer registered for extension: 'docx'");
    }

    #[test]
    fn json_error_classification() {
        let syntax = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(FormatError::from(syntax), FormatError::Syntax(_)));

        let shape = serde_json::from_str::<Vec<u8>>("{}").unwrap_err();
        assert!(matches!(
            FormatError::from(shape),
            FormatError::InvalidStructure(_)
        ));
    }
}
