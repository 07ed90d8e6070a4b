//! Per-document actor
//!
//! One task per open document owns the canonical [`Notebook`] and drains a
//! bounded command queue, so actions apply one at a time in arrival order.
//! Updates fan out to per-subscriber unbounded channels in application order.

use crate::error::SessionError;
use crate::kernel::KernelEvent;
use crate::manager::{SessionContext, Subscription};
use crate::state::{validate_transition, DocumentState};
use dashmap::DashMap;
use nbsync_model::Notebook;
use nbsync_protocol::{Action, ExecutionRequest, Update};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Client id used for actions that originate from kernel events
pub const KERNEL_CLIENT_ID: &str = "kernel";

pub(crate) type Registry = Arc<DashMap<PathBuf, DocumentHandle>>;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Point-in-time view of an open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub state: DocumentState,
    pub subscribers: usize,
    pub dirty: bool,
    pub cells: usize,
}

pub(crate) enum Command {
    Subscribe {
        client_id: String,
        reply: Reply<Subscription>,
    },
    Unsubscribe {
        client_id: String,
    },
    Apply {
        client_id: String,
        action: Action,
        reply: Reply<Option<Update>>,
    },
    Kernel {
        event: KernelEvent,
        reply: Reply<Option<Update>>,
    },
    Save {
        reply: Reply<()>,
    },
    Inspect {
        reply: oneshot::Sender<DocumentInfo>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

impl Command {
    /// Answer the command with an error, if it expects an answer
    fn fail(self, err: SessionError) {
        match self {
            Command::Subscribe { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Apply { reply, .. } | Command::Kernel { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Save { reply } => {
                let _ = reply.send(Err(err));
            }
            Command::Unsubscribe { .. } | Command::Inspect { .. } | Command::Close { .. } => {}
        }
    }
}

/// Sender side of a document actor
#[derive(Debug, Clone)]
pub(crate) struct DocumentHandle {
    pub(crate) generation: u64,
    pub(crate) sender: mpsc::Sender<Command>,
}

/// Start the actor for `path`; it loads the document before serving commands
pub(crate) fn spawn(
    path: PathBuf,
    generation: u64,
    ctx: SessionContext,
    registry: Registry,
) -> DocumentHandle {
    let (sender, receiver) = mpsc::channel(ctx.config.command_queue_capacity.max(1));
    tokio::spawn(run(path, generation, ctx, registry, receiver));
    DocumentHandle { generation, sender }
}

async fn run(
    path: PathBuf,
    generation: u64,
    ctx: SessionContext,
    registry: Registry,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut actor = DocumentActor {
        label: path.display().to_string(),
        path,
        generation,
        ctx,
        registry,
        state: DocumentState::Unloaded,
        notebook: Notebook::starter(),
        dirty: false,
        subscribers: HashMap::new(),
        close_deadline: None,
    };
    actor.set_state(DocumentState::Loading);

    let loaded = actor.ctx.store.read(&actor.path).await;
    match loaded {
        Ok(loaded) => {
            actor.notebook = loaded.notebook;
            // A starter only exists in memory until written
            actor.dirty = loaded.created;
            actor.set_state(DocumentState::Ready);
            actor.arm_close_timer();
            actor.serve(&mut commands).await;
        }
        Err(e) => {
            tracing::error!(document = %actor.label, error = %e, "failed to load document");
            actor.set_state(DocumentState::Closed);
            actor.deregister();
            commands.close();
            if let Some(first) = commands.recv().await {
                first.fail(e.into());
            }
        }
    }
    // Commands still queued are dropped; their callers see DocumentClosed
}

struct DocumentActor {
    path: PathBuf,
    label: String,
    generation: u64,
    ctx: SessionContext,
    registry: Registry,
    state: DocumentState,
    notebook: Notebook,
    dirty: bool,
    subscribers: HashMap<String, mpsc::UnboundedSender<Update>>,
    close_deadline: Option<Instant>,
}

impl DocumentActor {
    async fn serve(&mut self, commands: &mut mpsc::Receiver<Command>) {
        let mut autosave = self.ctx.config.autosave_interval().map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let deadline = self.close_deadline;
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        self.close().await;
                        break;
                    };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }
                () = sleep_until(deadline) => {
                    if self.subscribers.is_empty() {
                        tracing::debug!(document = %self.label, "grace period over");
                        self.close().await;
                        break;
                    }
                    self.close_deadline = None;
                }
                () = tick(autosave.as_mut()) => {
                    if self.dirty {
                        if let Err(e) = self.write().await {
                            tracing::warn!(document = %self.label, error = %e, "autosave failed");
                        }
                    }
                }
            }
        }
        commands.close();
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Subscribe { client_id, reply } => {
                let _ = reply.send(Ok(self.subscribe(client_id)));
            }
            Command::Unsubscribe { client_id } => {
                if self.subscribers.remove(&client_id).is_some() {
                    tracing::debug!(document = %self.label, client = %client_id, "unsubscribed");
                }
                self.arm_close_timer();
            }
            Command::Apply {
                client_id,
                action,
                reply,
            } => {
                let result = self.apply(&client_id, &action).await;
                return self.finish(result, reply);
            }
            Command::Kernel { event, reply } => {
                let result = match event.to_action() {
                    Some(action) => self.apply(KERNEL_CLIENT_ID, &action).await,
                    None => Ok(self.kernel_status(event)),
                };
                return self.finish(result, reply);
            }
            Command::Save { reply } => {
                let _ = reply.send(self.write().await);
            }
            Command::Inspect { reply } => {
                let _ = reply.send(self.info());
            }
            Command::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Reply, tearing the actor down if the document is no longer consistent
    fn finish(
        &mut self,
        result: Result<Option<Update>, SessionError>,
        reply: Reply<Option<Update>>,
    ) -> ControlFlow<()> {
        let fatal = matches!(&result, Err(SessionError::Protocol(e)) if e.is_fatal());
        let _ = reply.send(result);
        if fatal {
            self.set_state(DocumentState::Closed);
            self.deregister();
            self.subscribers.clear();
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn subscribe(&mut self, client_id: String) -> Subscription {
        let (sender, updates) = mpsc::unbounded_channel();
        if self.subscribers.insert(client_id.clone(), sender).is_some() {
            tracing::debug!(document = %self.label, client = %client_id, "replacing existing subscription");
        }
        self.close_deadline = None;
        tracing::info!(
            document = %self.label,
            client = %client_id,
            subscribers = self.subscribers.len(),
            "client subscribed"
        );
        Subscription {
            client_id,
            snapshot: Update::snapshot(self.notebook.clone()),
            updates,
        }
    }

    async fn apply(
        &mut self,
        client_id: &str,
        action: &Action,
    ) -> Result<Option<Update>, SessionError> {
        let applied = match nbsync_protocol::apply(&mut self.notebook, action) {
            Ok(applied) => applied,
            Err(e) if e.is_fatal() => {
                tracing::error!(
                    document = %self.label,
                    client = client_id,
                    action = action.kind(),
                    error = %e,
                    "document inconsistent; closing without saving"
                );
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(
                    document = %self.label,
                    client = client_id,
                    action = action.kind(),
                    error = %e,
                    "rejected action"
                );
                return Err(e.into());
            }
        };

        tracing::debug!(
            document = %self.label,
            client = client_id,
            action = action.kind(),
            executions = applied.executions.len(),
            "applied action"
        );
        if let Some(update) = &applied.update {
            self.dirty = true;
            self.broadcast(update);
        }
        match self.dispatch(applied.executions).await {
            Err(e) if applied.update.is_none() => Err(e),
            // The change is committed and broadcast; the refusal is only logged
            _ => Ok(applied.update),
        }
    }

    fn kernel_status(&mut self, event: KernelEvent) -> Option<Update> {
        let KernelEvent::Status {
            kernel_name,
            status,
        } = event
        else {
            return None;
        };
        tracing::debug!(document = %self.label, kernel = %kernel_name, %status, "kernel status");
        let update = Update::session_status(kernel_name, status);
        self.broadcast(&update);
        Some(update)
    }

    async fn dispatch(&self, requests: Vec<ExecutionRequest>) -> Result<(), SessionError> {
        for request in requests {
            let cell_id = request.cell_id.clone();
            if let Err(e) = self.ctx.kernel.execute(&self.label, request).await {
                tracing::warn!(document = %self.label, cell = %cell_id, error = %e, "execution request failed");
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn broadcast(&mut self, update: &Update) {
        let label = &self.label;
        self.subscribers.retain(|client_id, sender| {
            let delivered = sender.send(update.clone()).is_ok();
            if !delivered {
                tracing::debug!(document = %label, client = %client_id, "dropping disconnected subscriber");
            }
            delivered
        });
        self.arm_close_timer();
    }

    /// Write the notebook, bounded by the write timeout
    async fn write(&mut self) -> Result<(), SessionError> {
        let timeout = self.ctx.config.write_timeout();
        let result = tokio::time::timeout(timeout, self.ctx.store.write(&self.path, &self.notebook)).await;
        match result {
            Ok(Ok(bytes)) => {
                self.dirty = false;
                tracing::info!(document = %self.label, bytes, "saved document");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                tracing::error!(
                    document = %self.label,
                    timeout_ms = self.ctx.config.write_timeout_ms,
                    "write timed out"
                );
                Err(SessionError::Timeout {
                    operation: "write",
                    after_ms: self.ctx.config.write_timeout_ms,
                })
            }
        }
    }

    /// Final write if dirty, then leave the registry
    async fn close(&mut self) {
        self.set_state(DocumentState::Closing);
        if self.dirty {
            if let Err(e) = self.write().await {
                tracing::warn!(document = %self.label, error = %e, "final write failed; changes lost");
            }
        }
        self.set_state(DocumentState::Closed);
        self.deregister();
        tracing::info!(document = %self.label, "closed document");
    }

    fn arm_close_timer(&mut self) {
        if self.subscribers.is_empty() && self.close_deadline.is_none() {
            self.close_deadline = Some(Instant::now() + self.ctx.config.close_grace_period());
        }
    }

    fn deregister(&self) {
        self.registry
            .remove_if(&self.path, |_, handle| handle.generation == self.generation);
    }

    fn set_state(&mut self, to: DocumentState) {
        match validate_transition(self.state, to) {
            Ok(()) => self.state = to,
            Err(e) => tracing::error!(document = %self.label, error = %e, "state machine violation"),
        }
    }

    fn info(&self) -> DocumentInfo {
        DocumentInfo {
            state: self.state,
            subscribers: self.subscribers.len(),
            dirty: self.dirty,
            cells: self.notebook.cell_count(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
