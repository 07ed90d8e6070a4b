//! Session manager: routes requests to per-document actors

use crate::config::SessionConfig;
use crate::document::{self, Command, DocumentHandle, DocumentInfo, Registry};
use crate::error::SessionError;
use crate::kernel::{KernelEvent, KernelGateway};
use dashmap::DashMap;
use nbsync_model::Notebook;
use nbsync_protocol::{Action, Update};
use nbsync_storage::{validate_document_path, NotebookStore, StoreError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Collaborators shared by every document, built by the process entry point
#[derive(Clone)]
pub struct SessionContext {
    pub store: NotebookStore,
    pub kernel: Arc<dyn KernelGateway>,
    pub config: SessionConfig,
}

impl SessionContext {
    #[inline]
    #[must_use]
    pub fn new(store: NotebookStore, kernel: Arc<dyn KernelGateway>, config: SessionConfig) -> Self {
        Self {
            store,
            kernel,
            config,
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A client's view of one document: the snapshot at subscribe time plus
/// every later update, in application order
#[derive(Debug)]
pub struct Subscription {
    pub client_id: String,
    /// `notebook.snapshot` reflecting every update applied before subscribing
    pub snapshot: Update,
    pub updates: mpsc::UnboundedReceiver<Update>,
}

impl Subscription {
    /// Notebook carried by the snapshot
    #[must_use]
    pub fn notebook(&self) -> Option<&Notebook> {
        match &self.snapshot {
            Update::Snapshot { notebook } => Some(notebook),
            _ => None,
        }
    }

    /// Next update; `None` once the document has closed
    pub async fn next_update(&mut self) -> Option<Update> {
        self.updates.recv().await
    }

    /// Next update if one is already queued
    pub fn try_next_update(&mut self) -> Option<Update> {
        self.updates.try_recv().ok()
    }
}

/// Entry point for clients and the kernel
///
/// A subscription opens the document actor; every other request needs one
/// already running. The actor is forgotten once it closes. Every request
/// for a document is serialized through that document's actor.
#[derive(Debug)]
pub struct SessionManager {
    ctx: SessionContext,
    documents: Registry,
    next_generation: AtomicU64,
    shutting_down: AtomicBool,
}

impl SessionManager {
    #[must_use]
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            documents: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Paths of documents with a running actor
    #[must_use]
    pub fn open_documents(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.documents.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Subscribe a client to a document, loading it if needed
    ///
    /// # Errors
    /// - [`SessionError::Store`] if the document cannot be loaded
    /// - [`SessionError::DocumentClosed`] during shutdown
    pub async fn subscribe(
        &self,
        path: impl AsRef<Path>,
        client_id: impl Into<String>,
    ) -> Result<Subscription, SessionError> {
        let client_id = client_id.into();
        self.request(path.as_ref(), Open::IfMissing, |reply| Command::Subscribe {
            client_id: client_id.clone(),
            reply,
        })
        .await
    }

    /// Remove a subscription; unknown documents and clients are ignored
    ///
    /// # Errors
    /// [`SessionError::Store`] for an invalid document path
    pub async fn unsubscribe(
        &self,
        path: impl AsRef<Path>,
        client_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        let key = document_key(path.as_ref())?;
        let handle = self.documents.get(&key).map(|entry| entry.value().clone());
        if let Some(handle) = handle {
            let command = Command::Unsubscribe {
                client_id: client_id.into(),
            };
            // A closed actor has no subscribers left to remove
            let _ = handle.sender.send(command).await;
        }
        Ok(())
    }

    /// Apply a client action
    ///
    /// The resulting update goes to every subscriber (the sender included)
    /// and is returned. Rejections go to the caller only. Once the action
    /// has changed the notebook the call succeeds, even if the kernel then
    /// refuses an execution request.
    ///
    /// # Errors
    /// - [`SessionError::Protocol`] if the action is rejected
    /// - [`SessionError::Kernel`] if the kernel refused an execution request
    ///   and the action changed nothing
    /// - [`SessionError::DocumentClosed`] if nobody has the document open
    pub async fn apply_action(
        &self,
        path: impl AsRef<Path>,
        client_id: impl Into<String>,
        action: Action,
    ) -> Result<Option<Update>, SessionError> {
        let client_id = client_id.into();
        self.request(path.as_ref(), Open::Existing, |reply| Command::Apply {
            client_id: client_id.clone(),
            action: action.clone(),
            reply,
        })
        .await
    }

    /// Feed a kernel event into a document
    ///
    /// # Errors
    /// Same as [`SessionManager::apply_action`]
    pub async fn kernel_event(
        &self,
        path: impl AsRef<Path>,
        event: KernelEvent,
    ) -> Result<Option<Update>, SessionError> {
        self.request(path.as_ref(), Open::Existing, |reply| Command::Kernel {
            event: event.clone(),
            reply,
        })
        .await
    }

    /// Write an open document now
    ///
    /// # Errors
    /// - [`SessionError::Store`] if the write fails
    /// - [`SessionError::Timeout`] if it exceeds the write timeout
    /// - [`SessionError::DocumentClosed`] if nobody has the document open
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.request(path.as_ref(), Open::Existing, |reply| Command::Save { reply })
            .await
    }

    /// State of an open document; `None` if no actor is running
    pub async fn document_info(&self, path: impl AsRef<Path>) -> Option<DocumentInfo> {
        let key = document_key(path.as_ref()).ok()?;
        let handle = self.documents.get(&key).map(|entry| entry.value().clone())?;
        let (reply, response) = oneshot::channel();
        handle.sender.send(Command::Inspect { reply }).await.ok()?;
        response.await.ok()
    }

    /// Close every document (final write if dirty) and wait for the actors
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let handles: Vec<_> = self
            .documents
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        tracing::info!(documents = handles.len(), "shutting down sessions");

        let closing = handles.into_iter().map(|(path, handle)| async move {
            let (reply, done) = oneshot::channel();
            if handle.sender.send(Command::Close { reply }).await.is_ok() {
                let _ = done.await;
            }
            tracing::debug!(document = %path.display(), "document shut down");
        });
        futures::future::join_all(closing).await;
    }

    /// Route a command to the document's actor
    ///
    /// With [`Open::IfMissing`], an actor that closed between lookup and
    /// reply is replaced once.
    async fn request<T>(
        &self,
        path: &Path,
        open: Open,
        make: impl Fn(oneshot::Sender<Result<T, SessionError>>) -> Command,
    ) -> Result<T, SessionError> {
        let key = document_key(path)?;
        for _ in 0..2 {
            let handle = self.handle_for(&key, open)?;
            let (reply, response) = oneshot::channel();
            if handle.sender.send(make(reply)).await.is_err() {
                self.forget(&key, handle.generation);
                continue;
            }
            match response.await {
                Ok(result) => return result,
                Err(_) => self.forget(&key, handle.generation),
            }
        }
        Err(SessionError::closed(key))
    }

    fn handle_for(&self, key: &Path, open: Open) -> Result<DocumentHandle, SessionError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SessionError::closed(key));
        }
        if open == Open::Existing {
            return self
                .documents
                .get(key)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| SessionError::closed(key));
        }
        let handle = self
            .documents
            .entry(key.to_path_buf())
            .or_insert_with(|| {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                tracing::info!(document = %key.display(), generation, "opening document");
                document::spawn(
                    key.to_path_buf(),
                    generation,
                    self.ctx.clone(),
                    Arc::clone(&self.documents),
                )
            })
            .clone();
        Ok(handle)
    }

    fn forget(&self, key: &Path, generation: u64) {
        self.documents
            .remove_if(key, |_, handle| handle.generation == generation);
    }
}

/// Whether a request may start the document actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    IfMissing,
    Existing,
}

/// Normalized registry key, so `a.ipynb` and `./a.ipynb` share an actor
fn document_key(path: &Path) -> Result<PathBuf, SessionError> {
    validate_document_path(path).map_err(|e| SessionError::Store(StoreError::from(e)))
}
