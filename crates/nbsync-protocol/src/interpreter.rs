//! Action interpreter
//!
//! Turns one [`Action`] into a mutation of a [`Notebook`], the [`Update`]
//! describing it, and any [`ExecutionRequest`]s for the kernel.
//!
//! # Guarantees
//! - Validation and every lookup happen before the first write, so a failed
//!   action leaves the notebook untouched
//! - Composites run on a working copy that is committed only on success
//! - Invariants are checked after every successful application

use crate::action::{Action, AddCell, CellRef, CellUpdate, MoveCell};
use crate::error::ProtocolError;
use crate::update::Update;
use nbsync_model::{Cell, CellType, NotFoundError, Notebook, Worksheet};
use serde::{Deserialize, Serialize};

/// Notebook metadata key set by `action.notebook.rename`
pub const NOTEBOOK_NAME_KEY: &str = "name";

/// Request for the kernel collaborator to run a code cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub worksheet_id: String,
    pub cell_id: String,
    pub source: String,
}

/// Result of one successful application
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Applied {
    /// Update to broadcast, `None` for actions that do not mutate
    pub update: Option<Update>,
    /// Kernel requests, in document order
    pub executions: Vec<ExecutionRequest>,
}

/// Apply an action to a notebook
///
/// # Errors
/// - [`ProtocolError::MalformedAction`] if validation fails
/// - [`ProtocolError::NotFound`] for a missing worksheet, cell or anchor
/// - [`ProtocolError::AlreadyExists`] for a duplicate cell id
/// - [`ProtocolError::Consistency`] if the result breaks an invariant
pub fn apply(notebook: &mut Notebook, action: &Action) -> Result<Applied, ProtocolError> {
    action.validate()?;

    let mut executions = Vec::new();
    let update = match action {
        Action::Composite(composite) => {
            let mut working = notebook.clone();
            let mut sub_updates = Vec::with_capacity(composite.sub_actions.len());
            for sub in &composite.sub_actions {
                sub_updates.extend(apply_one(&mut working, sub, &mut executions)?);
            }
            *notebook = working;
            Some(Update::Composite { sub_updates })
        }
        other => apply_one(notebook, other, &mut executions)?,
    };

    notebook.check_invariants()?;
    Ok(Applied { update, executions })
}

fn apply_one(
    notebook: &mut Notebook,
    action: &Action,
    executions: &mut Vec<ExecutionRequest>,
) -> Result<Option<Update>, ProtocolError> {
    match action {
        Action::Composite(composite) => {
            let mut sub_updates = Vec::with_capacity(composite.sub_actions.len());
            for sub in &composite.sub_actions {
                sub_updates.extend(apply_one(notebook, sub, executions)?);
            }
            Ok(Some(Update::Composite { sub_updates }))
        }
        Action::ClearOutputs => Ok(Some(clear_all_outputs(notebook))),
        Action::ExecuteCells => {
            executions.extend(notebook.worksheets.iter().flat_map(|ws| {
                ws.cells
                    .iter()
                    .filter(|cell| cell.cell_type == CellType::Code)
                    .map(|cell| execution_request(&ws.id, cell))
            }));
            Ok(None)
        }
        Action::Rename(rename) => {
            notebook
                .metadata
                .insert(NOTEBOOK_NAME_KEY.into(), rename.name.clone().into());
            Ok(Some(Update::NotebookMetadata {
                metadata: notebook.metadata.clone(),
            }))
        }
        Action::AddCell(add) => add_cell(notebook, add).map(Some),
        Action::DeleteCell(target) => delete_cell(notebook, target).map(Some),
        Action::MoveCell(mv) => move_cell(notebook, mv).map(Some),
        Action::ClearOutput(target) => {
            let clear = CellUpdate::clear_outputs(&target.worksheet_id, &target.cell_id);
            update_cell(notebook, &clear).map(Some)
        }
        Action::UpdateCell(update) => update_cell(notebook, update).map(Some),
        Action::Execute(target) => {
            let cell = notebook.cell_or_err(&target.cell_id, &target.worksheet_id)?;
            if cell.cell_type == CellType::Code {
                executions.push(execution_request(&target.worksheet_id, cell));
            } else {
                tracing::debug!(cell = %cell.id, kind = %cell.cell_type, "ignoring execute for non-code cell");
            }
            Ok(None)
        }
    }
}

fn execution_request(worksheet_id: &str, cell: &Cell) -> ExecutionRequest {
    ExecutionRequest {
        worksheet_id: worksheet_id.to_string(),
        cell_id: cell.id.clone(),
        source: cell.source.clone(),
    }
}

/// Insertion index for an optional anchor: 0 when absent, after it otherwise
fn resolve_anchor(
    worksheet: &Worksheet,
    anchor: Option<&str>,
    notebook_id: &str,
) -> Result<usize, NotFoundError> {
    match anchor {
        None => Ok(0),
        Some(anchor) => worksheet
            .index_of(anchor)
            .map(|index| index + 1)
            .ok_or_else(|| NotFoundError::cell(anchor, &worksheet.id, notebook_id)),
    }
}

/// Id of the cell just before `index`, the anchor a replica needs
fn anchor_before(worksheet: &Worksheet, index: usize) -> Option<String> {
    index
        .checked_sub(1)
        .and_then(|prev| worksheet.cells.get(prev))
        .map(|cell| cell.id.clone())
}

fn add_cell(notebook: &mut Notebook, add: &AddCell) -> Result<Update, ProtocolError> {
    let notebook_id = notebook.id.clone();
    let worksheet = notebook.worksheet_mut_or_err(&add.worksheet_id)?;
    if worksheet.contains(&add.cell_id) {
        return Err(ProtocolError::already_exists(&add.cell_id, &add.worksheet_id));
    }
    let index = resolve_anchor(worksheet, add.insert_after.as_deref(), &notebook_id)?;

    let mut cell = Cell::new(&add.cell_id, add.cell_type, &add.source);
    if let Some(metadata) = &add.metadata {
        cell.metadata = metadata.clone();
    }
    worksheet.cells.insert(index, cell.clone());

    Ok(Update::AddCell {
        worksheet_id: add.worksheet_id.clone(),
        cell,
        insert_after: anchor_before(worksheet, index),
    })
}

fn delete_cell(notebook: &mut Notebook, target: &CellRef) -> Result<Update, ProtocolError> {
    let notebook_id = notebook.id.clone();
    let worksheet = notebook.worksheet_mut_or_err(&target.worksheet_id)?;
    let index = worksheet.index_of(&target.cell_id).ok_or_else(|| {
        NotFoundError::cell(&target.cell_id, &target.worksheet_id, &notebook_id)
    })?;
    worksheet.cells.remove(index);
    Ok(Update::DeleteCell(target.clone()))
}

fn move_cell(notebook: &mut Notebook, mv: &MoveCell) -> Result<Update, ProtocolError> {
    let notebook_id = notebook.id.clone();
    let source_index = notebook.worksheet_index(&mv.source_worksheet_id).ok_or_else(|| {
        NotFoundError::worksheet(&mv.source_worksheet_id, &notebook_id)
    })?;
    let dest_index = notebook
        .worksheet_index(&mv.destination_worksheet_id)
        .ok_or_else(|| NotFoundError::worksheet(&mv.destination_worksheet_id, &notebook_id))?;

    let from = notebook.worksheets[source_index]
        .index_of(&mv.cell_id)
        .ok_or_else(|| NotFoundError::cell(&mv.cell_id, &mv.source_worksheet_id, &notebook_id))?;

    let anchor = mv.insert_after.as_deref();
    let same_worksheet = source_index == dest_index;
    let dest = &notebook.worksheets[dest_index];

    if !same_worksheet && dest.contains(&mv.cell_id) {
        return Err(ProtocolError::already_exists(
            &mv.cell_id,
            &mv.destination_worksheet_id,
        ));
    }
    if let Some(anchor) = anchor {
        if !dest.contains(anchor) {
            return Err(NotFoundError::cell(anchor, &dest.id, &notebook_id).into());
        }
    }

    // Anchored on itself: stays where it is
    if same_worksheet && anchor == Some(mv.cell_id.as_str()) {
        return Ok(Update::MoveCell(MoveCell {
            insert_after: anchor_before(dest, from),
            ..mv.clone()
        }));
    }

    let cell = notebook.worksheets[source_index].cells.remove(from);
    let dest = &mut notebook.worksheets[dest_index];
    let to = resolve_anchor(dest, anchor, &notebook_id)?;
    dest.cells.insert(to, cell);

    Ok(Update::MoveCell(MoveCell {
        insert_after: anchor_before(dest, to),
        ..mv.clone()
    }))
}

fn update_cell(notebook: &mut Notebook, update: &CellUpdate) -> Result<Update, ProtocolError> {
    let cell = notebook.cell_mut_or_err(&update.cell_id, &update.worksheet_id)?;

    if let Some(source) = &update.source {
        cell.source.clone_from(source);
    }
    if let Some(outputs) = &update.outputs {
        if update.replace_outputs {
            cell.outputs.clone_from(outputs);
        } else {
            cell.outputs.extend(outputs.iter().cloned());
        }
    }
    if let Some(metadata) = &update.metadata {
        if update.replace_metadata {
            cell.metadata.clone_from(metadata);
        } else {
            cell.metadata
                .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    if let Some(prompt) = &update.prompt {
        cell.prompt = Some(prompt.clone());
    }

    Ok(Update::CellUpdate(update.clone()))
}

fn clear_all_outputs(notebook: &mut Notebook) -> Update {
    let mut sub_updates = Vec::new();
    for worksheet in &mut notebook.worksheets {
        for cell in worksheet.cells.iter_mut().filter(|c| !c.outputs.is_empty()) {
            cell.outputs.clear();
            sub_updates.push(Update::CellUpdate(CellUpdate::clear_outputs(
                &worksheet.id,
                &cell.id,
            )));
        }
    }
    Update::Composite { sub_updates }
}
