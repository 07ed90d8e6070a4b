//! Read-only accessors and invariant checks
//!
//! The `_or_err` lookups return [`NotFoundError`] naming the missing id;
//! [`Worksheet::index_of`] returns `None` as its not-found sentinel.

use crate::error::{ConsistencyError, NotFoundError};
use crate::notebook::{Cell, Notebook, Worksheet};
use std::collections::HashSet;

impl Notebook {
    /// Worksheet by id
    ///
    /// # Errors
    /// [`NotFoundError::Worksheet`] if absent
    pub fn worksheet_or_err(&self, worksheet_id: &str) -> Result<&Worksheet, NotFoundError> {
        self.worksheets
            .iter()
            .find(|ws| ws.id == worksheet_id)
            .ok_or_else(|| NotFoundError::worksheet(worksheet_id, &self.id))
    }

    /// Mutable worksheet by id
    ///
    /// # Errors
    /// [`NotFoundError::Worksheet`] if absent
    pub fn worksheet_mut_or_err(
        &mut self,
        worksheet_id: &str,
    ) -> Result<&mut Worksheet, NotFoundError> {
        let notebook_id = &self.id;
        self.worksheets
            .iter_mut()
            .find(|ws| ws.id == worksheet_id)
            .ok_or_else(|| NotFoundError::worksheet(worksheet_id, notebook_id))
    }

    /// Position of a worksheet, `None` if absent
    #[must_use]
    pub fn worksheet_index(&self, worksheet_id: &str) -> Option<usize> {
        self.worksheets.iter().position(|ws| ws.id == worksheet_id)
    }

    /// Cell by worksheet and cell id
    ///
    /// # Errors
    /// [`NotFoundError`] if either the worksheet or the cell is absent
    pub fn cell_or_err(&self, cell_id: &str, worksheet_id: &str) -> Result<&Cell, NotFoundError> {
        let worksheet = self.worksheet_or_err(worksheet_id)?;
        worksheet
            .cell(cell_id)
            .ok_or_else(|| NotFoundError::cell(cell_id, worksheet_id, &self.id))
    }

    /// Mutable cell by worksheet and cell id
    ///
    /// # Errors
    /// [`NotFoundError`] if either the worksheet or the cell is absent
    pub fn cell_mut_or_err(
        &mut self,
        cell_id: &str,
        worksheet_id: &str,
    ) -> Result<&mut Cell, NotFoundError> {
        let notebook_id = self.id.clone();
        let worksheet = self.worksheet_mut_or_err(worksheet_id)?;
        worksheet
            .cells
            .iter_mut()
            .find(|cell| cell.id == cell_id)
            .ok_or_else(|| NotFoundError::cell(cell_id, worksheet_id, notebook_id))
    }

    /// Verify document invariants
    ///
    /// - at least one worksheet
    /// - worksheet ids unique within the notebook
    /// - cell ids unique within each worksheet
    ///
    /// # Errors
    /// The first violated invariant
    pub fn check_invariants(&self) -> Result<(), ConsistencyError> {
        if self.worksheets.is_empty() {
            return Err(ConsistencyError::NoWorksheets {
                notebook_id: self.id.clone(),
            });
        }

        let mut worksheet_ids = HashSet::with_capacity(self.worksheets.len());
        for worksheet in &self.worksheets {
            if !worksheet_ids.insert(worksheet.id.as_str()) {
                return Err(ConsistencyError::DuplicateWorksheetId {
                    worksheet_id: worksheet.id.clone(),
                    notebook_id: self.id.clone(),
                });
            }
            worksheet.check_unique_cells()?;
        }
        Ok(())
    }
}

impl Worksheet {
    /// Position of a cell, `None` if absent
    #[must_use]
    pub fn index_of(&self, cell_id: &str) -> Option<usize> {
        self.cells.iter().position(|cell| cell.id == cell_id)
    }

    /// Cell by id
    #[must_use]
    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.id == cell_id)
    }

    /// Whether a cell with this id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, cell_id: &str) -> bool {
        self.index_of(cell_id).is_some()
    }

    /// Cell ids in order
    #[must_use]
    pub fn cell_ids(&self) -> Vec<&str> {
        self.cells.iter().map(|cell| cell.id.as_str()).collect()
    }

    fn check_unique_cells(&self) -> Result<(), ConsistencyError> {
        let mut seen = HashSet::with_capacity(self.cells.len());
        for cell in &self.cells {
            if !seen.insert(cell.id.as_str()) {
                return Err(ConsistencyError::DuplicateCellId {
                    cell_id: cell.id.clone(),
                    worksheet_id: self.id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::CellType;

    fn sample() -> Notebook {
        let ws1 = Worksheet::new("ws1", "One")
            .with_cell(Cell::new("c1", CellType::Code, "a"))
            .with_cell(Cell::new("c2", CellType::Markdown, "b"));
        let ws2 = Worksheet::new("ws2", "Two").with_cell(Cell::new("c1", CellType::Raw, "c"));
        Notebook::new("nb", vec![ws1, ws2])
    }

    #[test]
    fn worksheet_lookup() {
        let notebook = sample();
        assert_eq!(notebook.worksheet_or_err("ws2").unwrap().name, "Two");
        assert_eq!(
            notebook.worksheet_or_err("missing"),
            Err(NotFoundError::worksheet("missing", "nb"))
        );
        assert_eq!(notebook.worksheet_index("ws2"), Some(1));
    }

    #[test]
    fn cell_lookup_scoped_to_worksheet() {
        let notebook = sample();
        assert_eq!(notebook.cell_or_err("c1", "ws1").unwrap().source, "a");
        assert_eq!(notebook.cell_or_err("c1", "ws2").unwrap().source, "c");
        assert_eq!(
            notebook.cell_or_err("c2", "ws2"),
            Err(NotFoundError::cell("c2", "ws2", "nb"))
        );
        assert!(matches!(
            notebook.cell_or_err("c1", "ws3"),
            Err(NotFoundError::Worksheet { .. })
        ));
    }

    #[test]
    fn cell_mut_lookup() {
        let mut notebook = sample();
        notebook.cell_mut_or_err("c2", "ws1").unwrap().source = "edited".into();
        assert_eq!(notebook.cell_or_err("c2", "ws1").unwrap().source, "edited");
        assert!(notebook.cell_mut_or_err("zz", "ws1").is_err());
    }

    #[test]
    fn index_of_sentinel() {
        let notebook = sample();
        let ws = &notebook.worksheets[0];
        assert_eq!(ws.index_of("c2"), Some(1));
        assert_eq!(ws.index_of("nope"), None);
        assert_eq!(ws.cell_ids(), vec!["c1", "c2"]);
    }

    #[test]
    fn invariants_hold_for_cross_worksheet_duplicates() {
        // Same cell id in different worksheets is allowed
        assert!(sample().check_invariants().is_ok());
    }

    #[test]
    fn invariants_detect_violations() {
        let mut notebook = sample();
        notebook.worksheets[0]
            .cells
            .push(Cell::new("c1", CellType::Code, "dup"));
        assert!(matches!(
            notebook.check_invariants(),
            Err(ConsistencyError::DuplicateCellId { .. })
        ));

        let mut notebook = sample();
        notebook.worksheets[1].id = "ws1".into();
        assert!(matches!(
            notebook.check_invariants(),
            Err(ConsistencyError::DuplicateWorksheetId { .. })
        ));

        let notebook = Notebook::new("empty", Vec::new());
        assert!(matches!(
            notebook.check_invariants(),
            Err(ConsistencyError::NoWorksheets { .. })
        ));
    }
}
