//! nbsync Model
//!
//! The canonical in-memory notebook document shared by every other crate.
//!
//! # Core Concepts
//!
//! - [`Notebook`]: ordered worksheets plus free-form metadata
//! - [`Worksheet`]: an ordered list of [`Cell`]s
//! - [`Cell`]: one editable unit (code, markdown, heading, raw) with outputs
//! - [`CellOutput`]: a typed mimetype bundle produced by the kernel
//! - [`MetadataValue`]: closed value set for metadata maps
//!
//! Accessors never mutate. All mutation happens in the protocol interpreter,
//! which calls [`Notebook::check_invariants`] after every application.
//!
//! # Example
//!
//! ```rust,ignore
//! use nbsync_model::{Cell, CellType, Notebook};
//!
//! let mut notebook = Notebook::starter();
//! let ws = notebook.worksheet_mut_or_err("ws1")?;
//! ws.cells.push(Cell::new("c1", CellType::Code, "1+1"));
//!
//! assert_eq!(notebook.cell_or_err("c1", "ws1")?.source, "1+1");
//! notebook.check_invariants()?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod access;
mod error;
mod metadata;
mod notebook;

pub use error::{ConsistencyError, MetadataError, NotFoundError};
pub use metadata::{
    validate_client_metadata, validate_reserved, Metadata, MetadataValue, RESERVED_CELL_KEYS,
    STORAGE_CELL_KEYS,
};
pub use notebook::{
    Cell, CellOutput, CellType, MimetypeBundle, Notebook, OutputType, Worksheet,
    STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn starter_notebook_is_consistent() {
        let notebook = Notebook::starter();
        assert!(notebook.check_invariants().is_ok());
        assert_eq!(notebook.worksheets.len(), 1);
        assert_eq!(notebook.worksheets[0].id, STARTER_WORKSHEET_ID);
        assert!(notebook.worksheets[0].cells.is_empty());
    }

    #[test]
    fn lookup_then_check() {
        let mut notebook = Notebook::starter();
        notebook.worksheets[0]
            .cells
            .push(Cell::new("c1", CellType::Markdown, "# Title"));

        let cell = notebook.cell_or_err("c1", STARTER_WORKSHEET_ID).unwrap();
        assert_eq!(cell.cell_type, CellType::Markdown);
        assert!(notebook.check_invariants().is_ok());
    }
}
