//! Kernel collaborator
//!
//! The kernel is a black box: the session hands it [`ExecutionRequest`]s
//! through a [`KernelGateway`] and receives [`KernelEvent`]s back through
//! [`SessionManager::kernel_event`](crate::SessionManager::kernel_event).

use async_trait::async_trait;
use nbsync_model::CellOutput;
use nbsync_protocol::{Action, CellUpdate, ExecutionRequest, KernelStatus};

/// Errors reported by a [`KernelGateway`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// No kernel attached or reachable
    #[error("kernel unavailable: {0}")]
    Unavailable(String),

    /// Kernel refused the request
    #[error("kernel rejected request: {0}")]
    Rejected(String),
}

/// Outbound side of the kernel collaborator
#[async_trait]
pub trait KernelGateway: Send + Sync + 'static {
    /// Queue a cell for execution
    ///
    /// `document` is the document path the request came from. Returning
    /// means the request was accepted, not that it finished.
    ///
    /// # Errors
    /// [`KernelError`] if the request cannot be accepted
    async fn execute(&self, document: &str, request: ExecutionRequest) -> Result<(), KernelError>;
}

/// Gateway that accepts and discards every request
#[derive(Debug, Clone, Copy, Default)]
pub struct NullKernel;

#[async_trait]
impl KernelGateway for NullKernel {
    async fn execute(&self, document: &str, request: ExecutionRequest) -> Result<(), KernelError> {
        tracing::debug!(
            document,
            worksheet = %request.worksheet_id,
            cell = %request.cell_id,
            "no kernel attached; dropping execution request"
        );
        Ok(())
    }
}

/// Inbound events from the kernel
#[derive(Debug, Clone, PartialEq)]
pub enum KernelEvent {
    /// Kernel state change, broadcast as `notebook.sessionStatus`
    Status {
        kernel_name: String,
        status: KernelStatus,
    },
    /// Outputs to append to a cell
    Output {
        worksheet_id: String,
        cell_id: String,
        outputs: Vec<CellOutput>,
    },
    /// Execution counter for a cell, shown as its prompt
    ExecutionCount {
        worksheet_id: String,
        cell_id: String,
        count: u64,
    },
}

impl KernelEvent {
    /// The cell action an event becomes, `None` for status events
    #[must_use]
    pub fn to_action(&self) -> Option<Action> {
        match self {
            KernelEvent::Status { .. } => None,
            KernelEvent::Output {
                worksheet_id,
                cell_id,
                outputs,
            } => Some(
                CellUpdate::new(worksheet_id, cell_id)
                    .append_outputs(outputs.clone())
                    .into(),
            ),
            KernelEvent::ExecutionCount {
                worksheet_id,
                cell_id,
                count,
            } => Some(
                CellUpdate::new(worksheet_id, cell_id)
                    .with_prompt(count.to_string())
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsync_model::OutputType;

    #[test]
    fn output_event_appends() {
        let event = KernelEvent::Output {
            worksheet_id: "ws1".into(),
            cell_id: "c1".into(),
            outputs: vec![CellOutput::text(OutputType::Stdout, "hi")],
        };
        let Some(Action::UpdateCell(update)) = event.to_action() else {
            panic!("expected cell update");
        };
        assert!(!update.replace_outputs);
        assert_eq!(update.outputs.map(|o| o.len()), Some(1));
    }

    #[test]
    fn execution_count_sets_prompt() {
        let event = KernelEvent::ExecutionCount {
            worksheet_id: "ws1".into(),
            cell_id: "c1".into(),
            count: 12,
        };
        let Some(Action::UpdateCell(update)) = event.to_action() else {
            panic!("expected cell update");
        };
        assert_eq!(update.prompt.as_deref(), Some("12"));
        assert!(update.outputs.is_none());
    }

    #[test]
    fn status_has_no_action() {
        let event = KernelEvent::Status {
            kernel_name: "python3".into(),
            status: KernelStatus::Idle,
        };
        assert!(event.to_action().is_none());
    }

    #[tokio::test]
    async fn null_kernel_accepts() {
        let request = ExecutionRequest {
            worksheet_id: "ws1".into(),
            cell_id: "c1".into(),
            source: "1".into(),
        };
        assert!(NullKernel.execute("a.ipynb", request).await.is_ok());
    }
}
