//! Session error types

use crate::kernel::KernelError;
use nbsync_protocol::ProtocolError;
use nbsync_storage::StoreError;
use std::path::PathBuf;

/// Errors returned to the caller of a [`SessionManager`](crate::SessionManager) operation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Action was malformed, referenced something missing or broke the document
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Load or save failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Kernel refused an execution request
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// Document actor is gone (closed, torn down or shutting down)
    #[error("document closed: {}", path.display())]
    DocumentClosed { path: PathBuf },

    /// Operation exceeded its time bound
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

impl SessionError {
    #[inline]
    pub fn closed(path: impl Into<PathBuf>) -> Self {
        Self::DocumentClosed { path: path.into() }
    }

    /// Whether the error is the caller's fault and goes to them only
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Protocol(e) if !e.is_fatal())
    }
}
