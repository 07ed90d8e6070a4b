//! Filesystem backend and store tests against a temporary directory

use nbsync_format::IpynbVersion;
use nbsync_model::{Cell, CellType};
use nbsync_storage::{FsStorage, NotebookStore, StorageBackend, StorageConfig, StorageError, StoreError};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn fs_store(dir: &TempDir, config: StorageConfig) -> NotebookStore {
    let config = config.with_root(dir.path());
    NotebookStore::new(Arc::new(FsStorage::new(&config.root)), &config)
}

#[tokio::test]
async fn write_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let storage = FsStorage::new(dir.path());

    storage
        .write(Path::new("team/week1/a.ipynb"), b"{}")
        .await
        .unwrap();
    assert!(dir.path().join("team/week1/a.ipynb").exists());
    assert_eq!(storage.read(Path::new("team/week1/a.ipynb")).await.unwrap(), b"{}");
}

#[tokio::test]
async fn write_replaces_and_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let storage = FsStorage::new(dir.path());

    storage.write(Path::new("a.ipynb"), b"first").await.unwrap();
    storage.write(Path::new("a.ipynb"), b"second").await.unwrap();

    assert_eq!(storage.read(Path::new("a.ipynb")).await.unwrap(), b"second");
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn escaping_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = FsStorage::new(dir.path().join("root"));

    let err = storage
        .write(Path::new("../outside.ipynb"), b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidPath { .. }));
    assert!(!dir.path().join("outside.ipynb").exists());

    let err = storage.read(Path::new("/etc/hosts")).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidPath { .. }));
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let storage = FsStorage::new(dir.path());
    let err = storage.read(Path::new("nope.ipynb")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn store_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir, StorageConfig::default());

    let loaded = store.read(Path::new("a.ipynb")).await.unwrap();
    assert!(loaded.created);

    let mut notebook = loaded.notebook;
    notebook.worksheets[0]
        .cells
        .push(Cell::new("c1", CellType::Markdown, "line one\nline two"));
    store.write(Path::new("a.ipynb"), &notebook).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("a.ipynb")).unwrap();
    assert!(raw.contains("\"nbformat\": 3"));

    let reloaded = store.read(Path::new("a.ipynb")).await.unwrap();
    assert!(!reloaded.created);
    assert_eq!(reloaded.notebook, notebook);
}

#[tokio::test]
async fn store_writes_configured_version() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(
        &dir,
        StorageConfig::default().with_ipynb_write_version(IpynbVersion::V4),
    );
    let notebook = store.read(Path::new("b.ipynb")).await.unwrap().notebook;
    store.write(Path::new("b.ipynb"), &notebook).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("b.ipynb")).unwrap();
    assert!(raw.contains("\"nbformat\": 4"));
}

#[tokio::test]
async fn native_format_by_extension() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir, StorageConfig::default());
    let notebook = store.read(Path::new("c.nbjson")).await.unwrap().notebook;
    store.write(Path::new("c.nbjson"), &notebook).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("c.nbjson")).unwrap();
    assert!(raw.contains("\"worksheets\""));
    assert!(!raw.contains("nbformat"));
}

#[tokio::test]
async fn unsupported_extension_on_write() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir, StorageConfig::default());
    let notebook = nbsync_model::Notebook::starter();
    let err = store.write(Path::new("d.txt"), &notebook).await.unwrap_err();
    assert!(matches!(err, StoreError::Format { .. }));
    assert!(!dir.path().join("d.txt").exists());
}
