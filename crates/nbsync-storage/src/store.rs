//! Notebook store: backend bytes plus serializer selection

use crate::backend::StorageBackend;
use crate::error::{StorageError, StoreError};
use nbsync_format::{serializers_with, IpynbVersion, SerializerRegistry};
use nbsync_model::Notebook;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage configuration (`[storage]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for [`FsStorage`](crate::FsStorage)
    pub root: PathBuf,
    /// Serve a starter notebook when the document does not exist
    pub create_on_read: bool,
    /// Largest document accepted on read (bytes)
    pub max_file_size: usize,
    /// nbformat major version written for `.ipynb`
    pub ipynb_write_version: IpynbVersion,
}

impl StorageConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_create_on_read(mut self, create: bool) -> Self {
        self.create_on_read = create;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_ipynb_write_version(mut self, version: IpynbVersion) -> Self {
        self.ipynb_write_version = version;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            create_on_read: true,
            max_file_size: 10 * 1024 * 1024, // 10MB
            ipynb_write_version: IpynbVersion::default(),
        }
    }
}

/// A notebook as loaded from the store
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedNotebook {
    pub notebook: Notebook,
    /// True when the document did not exist and a starter was created
    pub created: bool,
}

/// Reads and writes notebooks through a [`StorageBackend`]
#[derive(Clone)]
pub struct NotebookStore {
    backend: Arc<dyn StorageBackend>,
    serializers: SerializerRegistry,
    create_on_read: bool,
    max_file_size: usize,
}

impl std::fmt::Debug for NotebookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookStore")
            .field("backend", &self.backend.name())
            .field("serializers", &self.serializers)
            .field("create_on_read", &self.create_on_read)
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

impl NotebookStore {
    /// Create store over a backend with serializers chosen by `config`
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, config: &StorageConfig) -> Self {
        Self {
            backend,
            serializers: serializers_with(config.ipynb_write_version),
            create_on_read: config.create_on_read,
            max_file_size: config.max_file_size,
        }
    }

    /// Replace the serializer registry
    #[inline]
    #[must_use]
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Override create-if-missing for this store
    #[inline]
    #[must_use]
    pub fn with_create_on_read(mut self, create: bool) -> Self {
        self.create_on_read = create;
        self
    }

    #[inline]
    #[must_use]
    pub fn create_on_read(&self) -> bool {
        self.create_on_read
    }

    #[inline]
    #[must_use]
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Load a notebook
    ///
    /// A missing document yields a starter notebook when `create_on_read`
    /// is set; the starter is not written until the caller saves it.
    ///
    /// # Errors
    /// - [`StoreError::Format`] for an unknown extension or unparsable bytes
    /// - [`StoreError::Storage`] for missing (without create), oversized or
    ///   unreadable documents
    pub async fn read(&self, path: &Path) -> Result<LoadedNotebook, StoreError> {
        let serializer = self
            .serializers
            .find_for_path(path)
            .map_err(|e| StoreError::format(path, e))?;

        let bytes = match self.backend.read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() && self.create_on_read => {
                let notebook = Notebook::starter();
                tracing::info!(
                    path = %path.display(),
                    notebook = %notebook.id,
                    "document missing; created starter notebook"
                );
                return Ok(LoadedNotebook {
                    notebook,
                    created: true,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.len() > self.max_file_size {
            return Err(StorageError::TooLarge {
                size: bytes.len(),
                max: self.max_file_size,
            }
            .into());
        }

        let notebook = serializer
            .parse(&bytes)
            .map_err(|e| StoreError::format(path, e))?;
        tracing::info!(
            path = %path.display(),
            format = serializer.name(),
            cells = notebook.cell_count(),
            "loaded notebook"
        );
        Ok(LoadedNotebook {
            notebook,
            created: false,
        })
    }

    /// Serialize and write a notebook, returning the byte count
    ///
    /// # Errors
    /// [`StoreError`] if serialization or the backend write fails
    pub async fn write(&self, path: &Path, notebook: &Notebook) -> Result<usize, StoreError> {
        let serializer = self
            .serializers
            .find_for_path(path)
            .map_err(|e| StoreError::format(path, e))?;
        let bytes = serializer
            .stringify(notebook)
            .map_err(|e| StoreError::format(path, e))?;

        if let Err(e) = self.backend.write(path, &bytes).await {
            tracing::error!(path = %path.display(), error = %e, "failed to write notebook");
            return Err(e.into());
        }
        tracing::debug!(
            path = %path.display(),
            format = serializer.name(),
            bytes = bytes.len(),
            "saved notebook"
        );
        Ok(bytes.len())
    }
}
