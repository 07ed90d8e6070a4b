//! Error types for storage backends and the notebook store

use nbsync_format::FormatError;
use std::path::PathBuf;

/// Errors raised by a [`StorageBackend`](crate::StorageBackend)
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing stored at the path
    #[error("document not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// IO error during read or write
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path is absolute, empty or escapes the storage root
    #[error("invalid document path: {}", path.display())]
    InvalidPath { path: PathBuf },

    /// Stored document exceeds the configured size limit
    #[error("document too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

impl StorageError {
    /// Create IO error for path, mapping `NotFound` to [`StorageError::NotFound`]
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Create not-found error for path
    #[inline]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Whether this is a missing-document error
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised by [`NotebookStore`](crate::NotebookStore)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Serializer selection, parse or stringify failure
    #[error("format error for {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

impl StoreError {
    /// Create format error for path
    pub fn format(path: impl Into<PathBuf>, source: FormatError) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = StorageError::io_error(
            "a.ipynb",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "document not found: a.ipynb");

        let err = StorageError::io_error(
            "a.ipynb",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::format("x.txt", FormatError::unsupported("txt"));
        assert_eq!(
            err.to_string(),
            "format error for x.txt: no serializer registered for extension: 'txt'"
        );
        let err: StoreError = StorageError::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(err.to_string(), "document too large: 10 bytes (max: 5)");
    }
}
