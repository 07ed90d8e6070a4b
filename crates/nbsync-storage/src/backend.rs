//! Storage backends
//!
//! A backend moves raw bytes for a document path. It knows nothing about
//! notebooks; [`NotebookStore`](crate::NotebookStore) layers parsing on top.
//! Document paths are relative, `/`-separated and may not contain `..`.

use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

/// Byte storage for documents
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Read the full contents stored at `path`
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if nothing is stored there
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Replace the contents stored at `path`
    ///
    /// Readers never observe a partially written document.
    ///
    /// # Errors
    /// [`StorageError`] if the write fails; the previous contents survive
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Reject absolute, empty and root-escaping document paths
///
/// # Errors
/// [`StorageError::InvalidPath`]
pub fn validate_document_path(path: &Path) -> Result<PathBuf, StorageError> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(StorageError::InvalidPath {
            path: path.to_path_buf(),
        });
    }
    Ok(clean)
}

/// Filesystem backend rooted at a directory
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_document_path(path)?))
    }
}

#[async_trait]
impl StorageBackend for FsStorage {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| StorageError::io_error(path, e))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io_error(path, e))?;
        }

        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = full.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&temp, bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io_error(path, e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &full).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io_error(path, e));
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote document");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fs"
    }
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: DashMap<PathBuf, Vec<u8>>,
}

impl MemoryStorage {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Raw contents, if present
    ///
    /// # Errors
    /// [`StorageError::InvalidPath`] for paths a write would also reject
    pub fn get(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        let key = validate_document_path(path)?;
        Ok(self.documents.get(&key).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        self.get(path)?.ok_or_else(|| StorageError::not_found(path))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let key = validate_document_path(path)?;
        self.documents.insert(key, bytes.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
