//! Client actions
//!
//! Wire form is a JSON object tagged by `action`:
//!
//! ```json
//! {"action": "action.worksheet.addCell", "worksheetId": "ws1", "cellId": "c1",
//!  "type": "code", "source": "1+1", "insertAfter": "c0"}
//! ```

use crate::error::ProtocolError;
use nbsync_model::{validate_client_metadata, CellOutput, CellType, Metadata};
use serde::{Deserialize, Serialize};

/// A requested change to a notebook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "action.composite")]
    Composite(Composite),
    #[serde(rename = "action.notebook.clearOutputs")]
    ClearOutputs,
    #[serde(rename = "action.notebook.executeCells")]
    ExecuteCells,
    #[serde(rename = "action.notebook.rename")]
    Rename(Rename),
    #[serde(rename = "action.worksheet.addCell")]
    AddCell(AddCell),
    #[serde(rename = "action.worksheet.deleteCell")]
    DeleteCell(CellRef),
    #[serde(rename = "action.worksheet.moveCell")]
    MoveCell(MoveCell),
    #[serde(rename = "action.cell.clearOutput")]
    ClearOutput(CellRef),
    #[serde(rename = "action.cell.update")]
    UpdateCell(CellUpdate),
    #[serde(rename = "action.cell.execute")]
    Execute(CellRef),
}

/// Ordered group of actions applied all-or-nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composite {
    pub sub_actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCell {
    pub worksheet_id: String,
    pub cell_id: String,
    #[serde(rename = "type")]
    pub cell_type: CellType,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl AddCell {
    #[must_use]
    pub fn new(
        worksheet_id: impl Into<String>,
        cell_id: impl Into<String>,
        cell_type: CellType,
        source: impl Into<String>,
    ) -> Self {
        Self {
            worksheet_id: worksheet_id.into(),
            cell_id: cell_id.into(),
            cell_type,
            source: source.into(),
            insert_after: None,
            metadata: None,
        }
    }

    /// Builder: insert after an existing cell instead of at the top
    #[inline]
    #[must_use]
    pub fn after(mut self, anchor: impl Into<String>) -> Self {
        self.insert_after = Some(anchor.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Addresses one cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRef {
    pub worksheet_id: String,
    pub cell_id: String,
}

impl CellRef {
    #[inline]
    #[must_use]
    pub fn new(worksheet_id: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Self {
            worksheet_id: worksheet_id.into(),
            cell_id: cell_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCell {
    pub source_worksheet_id: String,
    pub destination_worksheet_id: String,
    pub cell_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_after: Option<String>,
}

impl MoveCell {
    /// Move within one worksheet
    #[must_use]
    pub fn within(worksheet_id: impl Into<String>, cell_id: impl Into<String>) -> Self {
        let worksheet_id = worksheet_id.into();
        Self {
            source_worksheet_id: worksheet_id.clone(),
            destination_worksheet_id: worksheet_id,
            cell_id: cell_id.into(),
            insert_after: None,
        }
    }

    /// Move to another worksheet
    #[must_use]
    pub fn between(
        source_worksheet_id: impl Into<String>,
        destination_worksheet_id: impl Into<String>,
        cell_id: impl Into<String>,
    ) -> Self {
        Self {
            source_worksheet_id: source_worksheet_id.into(),
            destination_worksheet_id: destination_worksheet_id.into(),
            cell_id: cell_id.into(),
            insert_after: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn after(mut self, anchor: impl Into<String>) -> Self {
        self.insert_after = Some(anchor.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_same_worksheet(&self) -> bool {
        self.source_worksheet_id == self.destination_worksheet_id
    }
}

/// Partial cell update
///
/// Shared by `action.cell.update` and the `cell.update` update. Absent
/// fields are left alone. Outputs append and metadata merges unless the
/// matching `replace*` flag is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellUpdate {
    pub worksheet_id: String,
    pub cell_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<CellOutput>>,
    #[serde(default)]
    pub replace_outputs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub replace_metadata: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl CellUpdate {
    /// Update that changes nothing yet
    #[must_use]
    pub fn new(worksheet_id: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Self {
            worksheet_id: worksheet_id.into(),
            cell_id: cell_id.into(),
            source: None,
            outputs: None,
            replace_outputs: false,
            metadata: None,
            replace_metadata: false,
            prompt: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builder: append outputs
    #[inline]
    #[must_use]
    pub fn append_outputs(mut self, outputs: Vec<CellOutput>) -> Self {
        self.outputs = Some(outputs);
        self.replace_outputs = false;
        self
    }

    /// Builder: replace all outputs
    #[inline]
    #[must_use]
    pub fn replace_outputs(mut self, outputs: Vec<CellOutput>) -> Self {
        self.outputs = Some(outputs);
        self.replace_outputs = true;
        self
    }

    /// Builder: merge metadata key-by-key
    #[inline]
    #[must_use]
    pub fn merge_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self.replace_metadata = false;
        self
    }

    /// Builder: replace the whole metadata map
    #[inline]
    #[must_use]
    pub fn replace_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self.replace_metadata = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// The update that empties a cell's outputs
    #[must_use]
    pub fn clear_outputs(worksheet_id: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Self::new(worksheet_id, cell_id).replace_outputs(Vec::new())
    }
}

impl Action {
    /// Decode an action from its JSON wire form and validate it
    ///
    /// # Errors
    /// [`ProtocolError::MalformedAction`] for undecodable JSON, unknown
    /// discriminants, missing fields and failed validation
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        let action: Action = serde_json::from_str(raw)?;
        action.validate()?;
        Ok(action)
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
            Action::Composite(_) => "action.composite",
            Action::ClearOutputs => "action.notebook.clearOutputs",
            Action::ExecuteCells => "action.notebook.executeCells",
            Action::Rename(_) => "action.notebook.rename",
            Action::AddCell(_) => "action.worksheet.addCell",
            Action::DeleteCell(_) => "action.worksheet.deleteCell",
            Action::MoveCell(_) => "action.worksheet.moveCell",
            Action::ClearOutput(_) => "action.cell.clearOutput",
            Action::UpdateCell(_) => "action.cell.update",
            Action::Execute(_) => "action.cell.execute",
        }
    }

    /// Check the action without looking at any notebook
    ///
    /// # Errors
    /// [`ProtocolError::MalformedAction`] naming the offending field
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Action::Composite(composite) => composite
                .sub_actions
                .iter()
                .try_for_each(Action::validate),
            Action::ClearOutputs | Action::ExecuteCells | Action::Rename(_) => Ok(()),
            Action::AddCell(add) => {
                require_id("worksheetId", &add.worksheet_id)?;
                require_id("cellId", &add.cell_id)?;
                require_anchor(add.insert_after.as_deref())?;
                if let Some(metadata) = &add.metadata {
                    validate_client_metadata(metadata)?;
                }
                Ok(())
            }
            Action::DeleteCell(cell) | Action::ClearOutput(cell) | Action::Execute(cell) => {
                require_id("worksheetId", &cell.worksheet_id)?;
                require_id("cellId", &cell.cell_id)
            }
            Action::MoveCell(mv) => {
                require_id("sourceWorksheetId", &mv.source_worksheet_id)?;
                require_id("destinationWorksheetId", &mv.destination_worksheet_id)?;
                require_id("cellId", &mv.cell_id)?;
                require_anchor(mv.insert_after.as_deref())
            }
            Action::UpdateCell(update) => {
                require_id("worksheetId", &update.worksheet_id)?;
                require_id("cellId", &update.cell_id)?;
                if let Some(metadata) = &update.metadata {
                    validate_client_metadata(metadata)?;
                }
                update
                    .outputs
                    .iter()
                    .flatten()
                    .try_for_each(require_mime_types)
            }
        }
    }
}

impl From<AddCell> for Action {
    fn from(add: AddCell) -> Self {
        Action::AddCell(add)
    }
}

impl From<MoveCell> for Action {
    fn from(mv: MoveCell) -> Self {
        Action::MoveCell(mv)
    }
}

impl From<CellUpdate> for Action {
    fn from(update: CellUpdate) -> Self {
        Action::UpdateCell(update)
    }
}

impl From<Vec<Action>> for Action {
    fn from(sub_actions: Vec<Action>) -> Self {
        Action::Composite(Composite { sub_actions })
    }
}

fn require_id(field: &str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        Err(ProtocolError::malformed(format!("'{field}' must not be empty")))
    } else {
        Ok(())
    }
}

fn require_anchor(anchor: Option<&str>) -> Result<(), ProtocolError> {
    match anchor {
        Some(anchor) => require_id("insertAfter", anchor),
        None => Ok(()),
    }
}

/// Bundle keys must look like `type/subtype`
fn require_mime_types(output: &CellOutput) -> Result<(), ProtocolError> {
    match output.mimetype_bundle.keys().find(|mime| !mime.contains('/')) {
        Some(mime) => Err(ProtocolError::malformed(format!(
            "'{mime}' is not a mimetype"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsync_model::MetadataValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_add_cell() {
        let action = Action::from_json(
            r#"{"action": "action.worksheet.addCell", "worksheetId": "ws1",
                "cellId": "c1", "type": "code", "source": "1+1"}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::AddCell(AddCell::new("ws1", "c1", CellType::Code, "1+1"))
        );
    }

    #[test]
    fn decodes_unit_and_nested_actions() {
        let action = Action::from_json(
            r#"{"action": "action.composite", "subActions": [
                {"action": "action.notebook.clearOutputs"},
                {"action": "action.cell.execute", "worksheetId": "ws1", "cellId": "c1"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::from(vec![
                Action::ClearOutputs,
                Action::Execute(CellRef::new("ws1", "c1")),
            ])
        );
    }

    #[test]
    fn cell_update_flags_default_to_append_and_merge() {
        let action = Action::from_json(
            r#"{"action": "action.cell.update", "worksheetId": "ws1", "cellId": "c1",
                "outputs": [{"type": "stdout", "mimetypeBundle": {"text/plain": "hi"}}],
                "metadata": {"tags": ["a"]}}"#,
        )
        .unwrap();
        let Action::UpdateCell(update) = action else {
            panic!("expected cell update");
        };
        assert!(!update.replace_outputs);
        assert!(!update.replace_metadata);
        assert_eq!(update.outputs.unwrap()[0].plain_text(), Some("hi"));
    }

    #[test]
    fn wire_names_are_exact() {
        let action = Action::MoveCell(MoveCell::between("ws1", "ws2", "c1").after("c9"));
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "action": "action.worksheet.moveCell",
                "sourceWorksheetId": "ws1",
                "destinationWorksheetId": "ws2",
                "cellId": "c1",
                "insertAfter": "c9",
            })
        );
        assert_eq!(
            serde_json::to_value(Action::ExecuteCells).unwrap(),
            json!({"action": "action.notebook.executeCells"})
        );
    }

    #[test]
    fn malformed_inputs() {
        let cases = [
            "not json",
            r#"{"action": "action.cell.explode", "worksheetId": "ws1", "cellId": "c1"}"#,
            r#"{"worksheetId": "ws1", "cellId": "c1"}"#,
            r#"{"action": "action.cell.execute", "worksheetId": "ws1"}"#,
            r#"{"action": "action.cell.execute", "worksheetId": "", "cellId": "c1"}"#,
            r#"{"action": "action.worksheet.addCell", "worksheetId": "ws1", "cellId": "c1",
                "type": "code", "source": "", "insertAfter": ""}"#,
            r#"{"action": "action.worksheet.addCell", "worksheetId": "ws1", "cellId": "c1",
                "type": "widget", "source": ""}"#,
        ];
        for raw in cases {
            let err = Action::from_json(raw).unwrap_err();
            assert!(
                matches!(err, ProtocolError::MalformedAction(_)),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn reserved_metadata_is_validated() {
        let mut metadata = Metadata::new();
        metadata.insert("level".into(), MetadataValue::Int(7));
        let action = Action::AddCell(
            AddCell::new("ws1", "h", CellType::Heading, "Title").with_metadata(metadata),
        );
        assert!(matches!(
            action.validate(),
            Err(ProtocolError::MalformedAction(_))
        ));

        let mut metadata = Metadata::new();
        metadata.insert("language".into(), MetadataValue::Int(3));
        let action = Action::from(vec![Action::UpdateCell(
            CellUpdate::new("ws1", "c1").merge_metadata(metadata),
        )]);
        assert!(action.validate().is_err());
    }

    #[test]
    fn storage_keys_and_bare_mime_keys_are_rejected() {
        let mut metadata = Metadata::new();
        metadata.insert("id".into(), MetadataValue::from("mine"));
        let update = CellUpdate::new("ws1", "c1").merge_metadata(metadata.clone());
        assert!(matches!(
            Action::from(update).validate(),
            Err(ProtocolError::MalformedAction(_))
        ));
        let add = AddCell::new("ws1", "c1", CellType::Code, "").with_metadata(metadata);
        assert!(Action::from(add).validate().is_err());

        let output = CellOutput::new(nbsync_model::OutputType::Result).with_mime("text", "2");
        let update = CellUpdate::new("ws1", "c1").append_outputs(vec![output]);
        let err = Action::from(update).validate().unwrap_err();
        assert_eq!(err.to_string(), "malformed action: 'text' is not a mimetype");
    }

    #[test]
    fn kind_matches_wire_tag() {
        let action = Action::ClearOutput(CellRef::new("ws1", "c1"));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["action"], json!(action.kind()));
    }
}
