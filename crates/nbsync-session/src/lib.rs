//! nbsync Session
//!
//! Keeps every open notebook in memory, applies client actions one at a time
//! and fans the resulting updates out to all subscribers.
//!
//! # Core Concepts
//!
//! - [`SessionManager`]: entry point; opens a document on its first subscription
//! - **Document actor**: one task per open document, owning its notebook and
//!   its subscribers, serving commands in arrival order
//! - [`Subscription`]: snapshot at subscribe time plus an ordered update stream
//! - [`KernelGateway`]: where `action.cell.execute` requests go
//! - [`KernelEvent`]: kernel status, outputs and execution counts coming back
//!
//! # Architecture
//!
//! ```text
//! clients ──┐                      ┌─► subscriber 1
//!           ├─► SessionManager ─► actor(path) ─► subscriber 2
//! kernel  ──┘        │               │   │
//!                 DashMap            │   └─► KernelGateway
//!              path → handle    NotebookStore
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nbsync_session::{NullKernel, SessionConfig, SessionContext, SessionManager};
//! use nbsync_storage::{FsStorage, NotebookStore, StorageConfig};
//! use std::sync::Arc;
//!
//! let config = StorageConfig::new().with_root("notebooks");
//! let store = NotebookStore::new(Arc::new(FsStorage::new(&config.root)), &config);
//! let ctx = SessionContext::new(store, Arc::new(NullKernel), SessionConfig::default());
//! let manager = SessionManager::new(ctx);
//!
//! let mut sub = manager.subscribe("analysis.ipynb", "alice").await?;
//! while let Some(update) = sub.next_update().await {
//!     println!("{}", update.to_json()?);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
mod document;
pub mod error;
pub mod kernel;
pub mod manager;
pub mod state;

pub use config::SessionConfig;
pub use document::{DocumentInfo, KERNEL_CLIENT_ID};
pub use error::SessionError;
pub use kernel::{KernelError, KernelEvent, KernelGateway, NullKernel};
pub use manager::{SessionContext, SessionManager, Subscription};
pub use nbsync_protocol::KernelStatus;
pub use state::{allowed_transitions, validate_transition, DocumentState, IllegalTransition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use nbsync_model::CellType;
    use nbsync_protocol::{Action, AddCell, Update};
    use nbsync_storage::{MemoryStorage, NotebookStore, StorageConfig};
    use std::sync::Arc;

    fn manager() -> SessionManager {
        let store = NotebookStore::new(Arc::new(MemoryStorage::new()), &StorageConfig::default());
        SessionManager::new(SessionContext::new(
            store,
            Arc::new(NullKernel),
            SessionConfig::default(),
        ))
    }

    #[tokio::test]
    async fn subscribe_then_add_cell() {
        let manager = manager();
        let mut sub = manager.subscribe("a.ipynb", "alice").await.unwrap();
        assert_eq!(sub.notebook().map(nbsync_model::Notebook::cell_count), Some(0));

        let action: Action = AddCell::new("ws1", "c1", CellType::Code, "1+1").into();
        let update = manager.apply_action("a.ipynb", "alice", action).await.unwrap();

        assert!(matches!(update, Some(Update::AddCell { .. })));
        assert_eq!(sub.next_update().await, update);
        assert_eq!(manager.open_documents(), vec![std::path::PathBuf::from("a.ipynb")]);
    }

    #[tokio::test]
    async fn document_info_only_for_open_documents() {
        let manager = manager();
        assert!(manager.document_info("a.ipynb").await.is_none());

        let _sub = manager.subscribe("a.ipynb", "alice").await.unwrap();
        let info = manager.document_info("./a.ipynb").await.unwrap();
        assert_eq!(info.state, DocumentState::Ready);
        assert_eq!(info.subscribers, 1);
        // Created on read and not yet written
        assert!(info.dirty);
    }
}
