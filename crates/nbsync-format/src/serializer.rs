//! Serializer trait and extension registry
//!
//! A [`SerializerRegistry`] maps file extensions to [`NotebookSerializer`]s.
//! Storage picks the serializer for a document path through
//! [`SerializerRegistry::find_for_path`].

use crate::error::{FormatError, FormatResult};
use crate::ipynb::{IpynbSerializer, IpynbVersion};
use crate::native::NativeJsonSerializer;
use nbsync_model::Notebook;
use std::path::Path;
use std::sync::Arc;

/// Bidirectional transform between [`Notebook`] and on-disk bytes
///
/// Implement this trait to add support for new on-disk formats.
///
/// # Contract
/// - `stringify` output is always valid input to `parse`
/// - `parse(stringify(m)) == m` for every `m` representable in the format
pub trait NotebookSerializer: Send + Sync + 'static {
    /// Decode bytes into a notebook
    ///
    /// # Errors
    /// [`FormatError`] if the bytes are not a notebook in this format
    fn parse(&self, raw: &[u8]) -> FormatResult<Notebook>;

    /// Encode a notebook into bytes
    ///
    /// # Errors
    /// [`FormatError::Encode`] if encoding fails
    fn stringify(&self, notebook: &Notebook) -> FormatResult<Vec<u8>>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Serializer priority (higher = tried first when several match)
    fn priority(&self) -> i32 {
        0
    }

    /// Check if this serializer handles the given path
    fn can_handle(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Extension-keyed serializer registry
#[derive(Clone)]
pub struct SerializerRegistry {
    serializers: Vec<Arc<dyn NotebookSerializer>>,
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        default_serializers()
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("serializer_count", &self.serializers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl SerializerRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            serializers: Vec::new(),
        }
    }

    /// Register a serializer
    pub fn register<S: NotebookSerializer>(&mut self, serializer: S) {
        self.serializers.push(Arc::new(serializer));
        self.serializers
            .sort_by_key(|s| std::cmp::Reverse(s.priority()));
    }

    /// Serializer for a path, by extension
    ///
    /// # Errors
    /// [`FormatError::UnsupportedFormat`] naming the extension (empty if none)
    pub fn find_for_path(&self, path: &Path) -> FormatResult<Arc<dyn NotebookSerializer>> {
        self.serializers
            .iter()
            .find(|s| s.can_handle(path))
            .cloned()
            .ok_or_else(|| FormatError::unsupported(extension_of(path).unwrap_or("")))
    }

    /// All registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.serializers
            .iter()
            .flat_map(|s| s.extensions())
            .copied()
            .collect()
    }
}

/// Registry with the built-in serializers, writing ipynb as nbformat 3
#[inline]
#[must_use]
pub fn default_serializers() -> SerializerRegistry {
    serializers_with(IpynbVersion::V3)
}

/// Registry with the built-in serializers and a chosen ipynb write version
#[must_use]
pub fn serializers_with(ipynb_write_version: IpynbVersion) -> SerializerRegistry {
    let mut registry = SerializerRegistry::new();
    registry.register(IpynbSerializer::new(ipynb_write_version));
    registry.register(NativeJsonSerializer);
    registry
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}
