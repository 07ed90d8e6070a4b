//! nbsync Protocol
//!
//! The action → mutation → update protocol spoken between clients and a
//! notebook session.
//!
//! # Core Concepts
//!
//! - [`Action`]: a client request, tagged by `action` on the wire
//! - [`Update`]: a committed change broadcast to subscribers, tagged by `update`
//! - [`apply`]: validates and applies one action to a notebook
//! - [`ExecutionRequest`]: what `action.cell.execute` asks of the kernel
//!
//! # Architecture
//!
//! ```text
//! JSON → Action::from_json → apply(&mut Notebook) → Applied { update, executions }
//!                                                      │         │
//!                                           subscribers ┘         └ kernel gateway
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nbsync_model::Notebook;
//! use nbsync_protocol::{apply, Action};
//!
//! let mut notebook = Notebook::starter();
//! let action = Action::from_json(
//!     r#"{"action":"action.worksheet.addCell","worksheetId":"ws1","cellId":"c1","type":"code","source":"1+1"}"#,
//! )?;
//! let applied = apply(&mut notebook, &action)?;
//! println!("{}", applied.update.unwrap().to_json()?);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod action;
pub mod error;
pub mod interpreter;
pub mod update;

pub use action::{Action, AddCell, CellRef, CellUpdate, Composite, MoveCell, Rename};
pub use error::ProtocolError;
pub use interpreter::{apply, Applied, ExecutionRequest, NOTEBOOK_NAME_KEY};
pub use update::{KernelStatus, Update};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
