//! nbsync CLI
//!
//! Offline tooling over the session stack: format conversion, notebook
//! summaries and scripted action application.
//!
//! # Example
//!
//! ```rust,ignore
//! use nbsync_cli::{commands, NbsyncConfig};
//!
//! let config = NbsyncConfig::load("nbsync.toml".as_ref())?;
//! let summary = commands::convert("old.ipynb".as_ref(), "old.nbjson".as_ref(), &config).await?;
//! print!("{}", summary.to_text());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod config;

pub use commands::{ApplyReport, NotebookSummary, WorksheetSummary};
pub use config::{ConfigError, NbsyncConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
