//! nbsync Storage
//!
//! Durable storage for notebooks.
//!
//! # Core Concepts
//!
//! - [`StorageBackend`]: async byte storage keyed by relative document path
//! - [`FsStorage`]: rooted directory, atomic temp-file-then-rename writes
//! - [`MemoryStorage`]: concurrent in-memory map, for tests and scratch use
//! - [`NotebookStore`]: picks a serializer by extension, enforces the size
//!   limit and serves a starter notebook for missing documents
//!
//! # Example
//!
//! ```rust,ignore
//! use nbsync_storage::{FsStorage, NotebookStore, StorageConfig};
//! use std::sync::Arc;
//!
//! let config = StorageConfig::new().with_root("notebooks");
//! let store = NotebookStore::new(Arc::new(FsStorage::new(&config.root)), &config);
//!
//! let loaded = store.read("analysis.ipynb".as_ref()).await?;
//! store.write("analysis.ipynb".as_ref(), &loaded.notebook).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod backend;
pub mod error;
pub mod store;

pub use backend::{validate_document_path, FsStorage, MemoryStorage, StorageBackend};
pub use error::{StorageError, StoreError};
pub use store::{LoadedNotebook, NotebookStore, StorageConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
