//! Updates broadcast to subscribers
//!
//! Wire form is a JSON object tagged by `update`. Applying an update to a
//! replica that mirrors the sender's notebook reproduces the sender's
//! mutation exactly.

use crate::action::{CellRef, CellUpdate, MoveCell};
use nbsync_model::{Cell, Metadata, Notebook};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kernel state reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelStatus {
    Starting,
    Idle,
    Busy,
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelStatus::Starting => "starting",
            KernelStatus::Idle => "idle",
            KernelStatus::Busy => "busy",
        };
        f.write_str(s)
    }
}

/// A committed change, in application order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "update")]
pub enum Update {
    #[serde(rename = "composite", rename_all = "camelCase")]
    Composite { sub_updates: Vec<Update> },

    #[serde(rename = "notebook.snapshot")]
    Snapshot { notebook: Notebook },

    #[serde(rename = "notebook.metadata")]
    NotebookMetadata { metadata: Metadata },

    #[serde(rename = "notebook.sessionStatus", rename_all = "camelCase")]
    SessionStatus {
        kernel_name: String,
        kernel_status: KernelStatus,
    },

    #[serde(rename = "worksheet.addCell", rename_all = "camelCase")]
    AddCell {
        worksheet_id: String,
        cell: Cell,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert_after: Option<String>,
    },

    #[serde(rename = "worksheet.deleteCell")]
    DeleteCell(CellRef),

    #[serde(rename = "worksheet.moveCell")]
    MoveCell(MoveCell),

    #[serde(rename = "cell.update")]
    CellUpdate(CellUpdate),
}

impl Update {
    /// Full-document update sent to a new subscriber
    #[inline]
    #[must_use]
    pub fn snapshot(notebook: Notebook) -> Self {
        Update::Snapshot { notebook }
    }

    #[inline]
    #[must_use]
    pub fn session_status(kernel_name: impl Into<String>, kernel_status: KernelStatus) -> Self {
        Update::SessionStatus {
            kernel_name: kernel_name.into(),
            kernel_status,
        }
    }

    /// Encode to the JSON wire form
    ///
    /// # Errors
    /// Propagates serializer failures
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire discriminant, for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Update::Composite { .. } => "composite",
            Update::Snapshot { .. } => "notebook.snapshot",
            Update::NotebookMetadata { .. } => "notebook.metadata",
            Update::SessionStatus { .. } => "notebook.sessionStatus",
            Update::AddCell { .. } => "worksheet.addCell",
            Update::DeleteCell(_) => "worksheet.deleteCell",
            Update::MoveCell(_) => "worksheet.moveCell",
            Update::CellUpdate(_) => "cell.update",
        }
    }
}
