//! nbsync Format
//!
//! Converts between the in-memory [`Notebook`](nbsync_model::Notebook) and
//! the bytes stored on disk.
//!
//! # Core Concepts
//!
//! - [`NotebookSerializer`]: parse/stringify for one on-disk format
//! - [`SerializerRegistry`]: picks a serializer by file extension
//! - [`IpynbSerializer`]: nbformat 3 and 4 (`.ipynb`)
//! - [`NativeJsonSerializer`]: the model's own JSON shape (`.nbjson`)
//!
//! # Architecture
//!
//! ```text
//! bytes → SerializerRegistry::find_for_path → parse → Notebook
//! Notebook → stringify → bytes
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nbsync_format::default_serializers;
//! use std::path::Path;
//!
//! let registry = default_serializers();
//! let serializer = registry.find_for_path(Path::new("analysis.ipynb"))?;
//! let notebook = serializer.parse(&std::fs::read("analysis.ipynb")?)?;
//! let bytes = serializer.stringify(&notebook)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod ipynb;
pub mod native;
pub mod serializer;

pub use error::{FormatError, FormatResult};
pub use ipynb::{IpynbSerializer, IpynbVersion, ERROR_DETAILS_KEY};
pub use native::NativeJsonSerializer;
pub use serializer::{default_serializers, serializers_with, NotebookSerializer, SerializerRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
