//! Native JSON format: the model's own serde shape
//!
//! Lossless for every notebook, including multiple worksheets, heading
//! cells and non-numeric prompts.

use crate::error::{FormatError, FormatResult};
use crate::serializer::NotebookSerializer;
use nbsync_model::Notebook;

/// `.nbjson` serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeJsonSerializer;

impl NotebookSerializer for NativeJsonSerializer {
    fn parse(&self, raw: &[u8]) -> FormatResult<Notebook> {
        let notebook: Notebook = serde_json::from_slice(raw)?;
        notebook
            .check_invariants()
            .map_err(|e| FormatError::structure(e.to_string()))?;
        Ok(notebook)
    }

    fn stringify(&self, notebook: &Notebook) -> FormatResult<Vec<u8>> {
        let mut bytes =
            serde_json::to_vec_pretty(notebook).map_err(|e| FormatError::Encode(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn extensions(&self) -> &[&str] {
        &["nbjson"]
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsync_model::{Cell, CellType, Worksheet};

    #[test]
    fn keeps_everything_ipynb_would_drop() {
        let notebook = Notebook::new(
            "nb",
            vec![
                Worksheet::new("a", "First").with_cell(
                    Cell::new("h", CellType::Heading, "Title").with_metadata("level", 3i64),
                ),
                Worksheet::new("b", "Second")
                    .with_cell(Cell::new("c", CellType::Code, "x").with_prompt("*")),
            ],
        );
        let serializer = NativeJsonSerializer;
        let bytes = serializer.stringify(&notebook).unwrap();
        assert_eq!(serializer.parse(&bytes).unwrap(), notebook);
    }

    #[test]
    fn rejects_duplicate_cell_ids() {
        let raw = br#"{
            "id": "nb",
            "worksheets": [{
                "id": "ws1", "name": "Main",
                "cells": [
                    {"id": "c1", "type": "code", "source": ""},
                    {"id": "c1", "type": "raw", "source": ""}
                ]
            }]
        }"#;
        let err = NativeJsonSerializer.parse(raw).unwrap_err();
        assert!(matches!(err, FormatError::InvalidStructure(_)));
    }
}
