//! nbformat 4: one flat cell list, `source` everywhere, `data` bundles

use super::v3::{error_fields, parse_error_output};
use super::{
    as_array, as_object, check_cell_metadata, execution_count, join_text, metadata_from,
    metadata_to, split_lines, take_string, IdAllocator, ID_KEY, NAME_KEY, PROMPT_KEY,
    WORKSHEET_KEY,
};
use crate::error::{FormatError, FormatResult};
use nbsync_model::{
    Cell, CellOutput, CellType, Metadata, MetadataValue, MimetypeBundle, Notebook, OutputType,
    Worksheet, STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME,
};
use serde_json::{json, Map, Value};

/// Minor version with top-level cell ids
const NBFORMAT_MINOR: u64 = 5;

pub(super) fn parse_notebook(root: &Value) -> FormatResult<Notebook> {
    let root = as_object(root, "notebook")?;
    let mut metadata = metadata_from(root.get("metadata"))?;
    let id = take_string(&mut metadata, ID_KEY).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut worksheet = match metadata.remove(WORKSHEET_KEY) {
        Some(MetadataValue::Map(mut info)) => {
            let ws_id = take_string(&mut info, ID_KEY)
                .unwrap_or_else(|| STARTER_WORKSHEET_ID.to_string());
            let name = take_string(&mut info, NAME_KEY)
                .unwrap_or_else(|| STARTER_WORKSHEET_NAME.to_string());
            let mut ws = Worksheet::new(ws_id, name);
            if let Some(MetadataValue::Map(ws_metadata)) = info.remove("metadata") {
                ws.metadata = ws_metadata;
            }
            ws
        }
        Some(other) => {
            // Someone else's key; leave it in place
            metadata.insert(WORKSHEET_KEY.into(), other);
            Worksheet::new(STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME)
        }
        None => Worksheet::new(STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME),
    };

    let mut cell_ids = IdAllocator::default();
    worksheet.cells = as_array(root.get("cells"), "cells")?
        .iter()
        .enumerate()
        .map(|(i, cell)| parse_cell(cell, i, &mut cell_ids))
        .collect::<FormatResult<Vec<_>>>()?;

    Ok(Notebook {
        id,
        metadata,
        worksheets: vec![worksheet],
    })
}

fn parse_cell(value: &Value, index: usize, ids: &mut IdAllocator) -> FormatResult<Cell> {
    let obj = as_object(value, "cell")?;
    let mut metadata = metadata_from(obj.get("metadata"))?;
    let id = ids.claim(
        obj.get("id").and_then(Value::as_str).map(str::to_string),
        format!("c{}", index + 1),
    );
    let source = join_text(obj.get("source"), "source")?;

    let cell_type = obj
        .get("cell_type")
        .and_then(Value::as_str)
        .ok_or_else(|| FormatError::structure("cell is missing 'cell_type'"))?;

    let mut cell = match cell_type {
        "code" => {
            let mut cell = Cell::new(id, CellType::Code, source);
            cell.prompt = obj
                .get("execution_count")
                .and_then(Value::as_u64)
                .map(|n| n.to_string())
                .or_else(|| take_string(&mut metadata, PROMPT_KEY));
            cell.outputs = as_array(obj.get("outputs"), "outputs")?
                .iter()
                .map(parse_output)
                .collect::<FormatResult<Vec<_>>>()?;
            cell
        }
        "markdown" => Cell::new(id, CellType::Markdown, source),
        "raw" => Cell::new(id, CellType::Raw, source),
        other => {
            return Err(FormatError::structure(format!(
                "unknown cell type '{other}'"
            )))
        }
    };
    check_cell_metadata(&cell.id, &metadata)?;
    cell.metadata = metadata;
    Ok(cell)
}

fn parse_output(value: &Value) -> FormatResult<CellOutput> {
    let obj = as_object(value, "output")?;
    let output_type = obj
        .get("output_type")
        .and_then(Value::as_str)
        .ok_or_else(|| FormatError::structure("output is missing 'output_type'"))?;

    match output_type {
        "execute_result" | "display_data" => {
            let data = match obj.get("data") {
                Some(data) => as_object(data, "output data")?.clone(),
                None => Map::new(),
            };
            let mut bundle = MimetypeBundle::new();
            for (mime, content) in &data {
                let text = match content {
                    Value::String(_) | Value::Array(_) => join_text(Some(content), mime)?,
                    // JSON mime payloads are stored as objects in v4
                    other => other.to_string(),
                };
                bundle.insert(mime.clone(), text);
            }
            Ok(CellOutput {
                output_type: OutputType::Result,
                mimetype_bundle: bundle,
                metadata: metadata_from(obj.get("metadata"))?,
            })
        }
        "stream" => {
            let output_type = match obj.get("name").and_then(Value::as_str) {
                Some("stderr") => OutputType::Stderr,
                _ => OutputType::Stdout,
            };
            Ok(CellOutput::text(output_type, join_text(obj.get("text"), "text")?))
        }
        "error" => parse_error_output(obj),
        other => Err(FormatError::structure(format!(
            "unknown output type '{other}'"
        ))),
    }
}

pub(super) fn notebook_to_value(notebook: &Notebook) -> FormatResult<Value> {
    let mut metadata = metadata_to(&notebook.metadata)?;
    metadata.insert(ID_KEY.into(), Value::String(notebook.id.clone()));

    if notebook.worksheets.len() > 1 {
        tracing::warn!(
            notebook = %notebook.id,
            worksheets = notebook.worksheets.len(),
            "nbformat 4 has no worksheets; flattening cells into one list"
        );
    }

    if let Some(first) = notebook.worksheets.first() {
        let mut info = Metadata::new();
        info.insert(ID_KEY.into(), first.id.clone().into());
        info.insert(NAME_KEY.into(), first.name.clone().into());
        if !first.metadata.is_empty() {
            info.insert("metadata".into(), MetadataValue::Map(first.metadata.clone()));
        }
        metadata.insert(
            WORKSHEET_KEY.into(),
            Value::Object(metadata_to(&info)?),
        );
    }

    let mut cell_ids = IdAllocator::default();
    let cells = notebook
        .worksheets
        .iter()
        .flat_map(|ws| ws.cells.iter())
        .map(|cell| {
            // Flattening can collide ids that were unique per worksheet
            let id = cell_ids.claim(Some(cell.id.clone()), cell.id.clone());
            cell_to_value(cell, id)
        })
        .collect::<FormatResult<Vec<_>>>()?;

    Ok(json!({
        "cells": cells,
        "metadata": metadata,
        "nbformat": 4,
        "nbformat_minor": NBFORMAT_MINOR,
    }))
}

fn cell_to_value(cell: &Cell, id: String) -> FormatResult<Value> {
    let mut metadata = cell.metadata.clone();
    let count = match (cell.cell_type, cell.prompt.as_deref()) {
        (CellType::Code, Some(prompt)) => {
            let count = execution_count(prompt);
            if count.is_none() {
                metadata.insert(PROMPT_KEY.into(), prompt.into());
            }
            count
        }
        _ => None,
    };

    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(id));
    obj.insert("metadata".into(), Value::Object(metadata_to(&metadata)?));

    match cell.cell_type {
        CellType::Code => {
            obj.insert("cell_type".into(), "code".into());
            obj.insert("source".into(), split_lines(&cell.source));
            obj.insert(
                "execution_count".into(),
                count.map_or(Value::Null, Value::from),
            );
            let outputs = cell
                .outputs
                .iter()
                .map(output_to_value)
                .collect::<FormatResult<Vec<_>>>()?;
            obj.insert("outputs".into(), Value::Array(outputs));
        }
        CellType::Heading => {
            tracing::warn!(cell = %cell.id, "nbformat 4 has no heading cells; writing markdown");
            let level = cell.heading_level().ok().flatten().unwrap_or(1);
            let text = format!("{} {}", "#".repeat(usize::from(level)), cell.source);
            obj.insert("cell_type".into(), "markdown".into());
            obj.insert("source".into(), split_lines(&text));
        }
        CellType::Markdown | CellType::Raw => {
            obj.insert("cell_type".into(), cell.cell_type.as_str().into());
            obj.insert("source".into(), split_lines(&cell.source));
        }
    }
    Ok(Value::Object(obj))
}

fn output_to_value(output: &CellOutput) -> FormatResult<Value> {
    let value = match output.output_type {
        OutputType::Result => {
            let data: Map<String, Value> = output
                .mimetype_bundle
                .iter()
                .map(|(mime, content)| (mime.clone(), split_lines(content)))
                .collect();
            json!({
                "output_type": "execute_result",
                "data": data,
                "metadata": metadata_to(&output.metadata)?,
                "execution_count": Value::Null,
            })
        }
        OutputType::Stdout | OutputType::Stderr => {
            let name = if output.output_type == OutputType::Stderr {
                "stderr"
            } else {
                "stdout"
            };
            json!({
                "output_type": "stream",
                "name": name,
                "text": split_lines(output.plain_text().unwrap_or_default()),
            })
        }
        OutputType::Error => {
            let (ename, evalue, traceback) = error_fields(output);
            json!({
                "output_type": "error",
                "ename": ename,
                "evalue": evalue,
                "traceback": traceback,
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_v4() -> Value {
        json!({
            "cells": [
                {"cell_type": "markdown", "id": "intro", "metadata": {}, "source": "# Intro\nText"},
                {
                    "cell_type": "code",
                    "execution_count": 7,
                    "id": "calc",
                    "metadata": {"collapsed": true},
                    "source": ["import json\n", "json.dumps({})"],
                    "outputs": [
                        {"output_type": "execute_result", "execution_count": 7,
                         "data": {"text/plain": ["'{}'"], "application/json": {"a": 1}},
                         "metadata": {}},
                        {"output_type": "stream", "name": "stderr", "text": "warn\n"},
                        {"output_type": "error", "ename": "KeyError", "evalue": "'x'",
                         "traceback": ["line"]}
                    ]
                },
                {"cell_type": "raw", "metadata": {}, "source": []}
            ],
            "metadata": {"kernelspec": {"name": "python3"}},
            "nbformat": 4,
            "nbformat_minor": 4
        })
    }

    #[test]
    fn parses_jupyter_v4_file() {
        let notebook = parse_notebook(&sample_v4()).unwrap();
        assert_eq!(notebook.worksheets.len(), 1);

        let ws = &notebook.worksheets[0];
        assert_eq!(ws.id, STARTER_WORKSHEET_ID);
        assert_eq!(ws.cell_ids(), vec!["intro", "calc", "c3"]);
        assert_eq!(ws.cells[0].source, "# Intro\nText");

        let code = &ws.cells[1];
        assert_eq!(code.prompt.as_deref(), Some("7"));
        assert_eq!(code.is_collapsed(), Ok(true));
        assert_eq!(code.outputs[0].mimetype_bundle["application/json"], r#"{"a":1}"#);
        assert_eq!(code.outputs[1].output_type, OutputType::Stderr);
        assert_eq!(code.outputs[2].plain_text(), Some("KeyError: 'x'"));

        assert!(notebook.metadata.contains_key("kernelspec"));
    }

    #[test]
    fn writes_and_rereads_single_worksheet() {
        let notebook = parse_notebook(&sample_v4()).unwrap();
        let value = notebook_to_value(&notebook).unwrap();

        assert_eq!(value["nbformat"], json!(4));
        assert_eq!(value["nbformat_minor"], json!(5));
        assert_eq!(value["cells"][1]["execution_count"], json!(7));
        assert_eq!(value["metadata"]["worksheet"]["id"], json!("ws1"));

        let again = parse_notebook(&value).unwrap();
        assert_eq!(again, notebook);
    }

    #[test]
    fn heading_becomes_markdown() {
        let ws = Worksheet::new("ws1", "Main").with_cell(
            Cell::new("h", CellType::Heading, "Results").with_metadata("level", 2i64),
        );
        let notebook = Notebook::new("nb", vec![ws]);
        let value = notebook_to_value(&notebook).unwrap();
        assert_eq!(value["cells"][0]["cell_type"], json!("markdown"));
        assert_eq!(value["cells"][0]["source"], json!(["## Results"]));
    }

    #[test]
    fn flattening_keeps_cell_ids_unique() {
        let notebook = Notebook::new(
            "nb",
            vec![
                Worksheet::new("a", "A").with_cell(Cell::new("c1", CellType::Code, "")),
                Worksheet::new("b", "B").with_cell(Cell::new("c1", CellType::Code, "")),
            ],
        );
        let value = notebook_to_value(&notebook).unwrap();
        assert_eq!(value["cells"][0]["id"], json!("c1"));
        assert_ne!(value["cells"][1]["id"], json!("c1"));
    }

    #[test]
    fn busy_and_padded_prompts_survive() {
        for prompt in ["*", "03"] {
            let notebook = Notebook::new(
                "nb",
                vec![Worksheet::new("ws1", "Main")
                    .with_cell(Cell::new("c1", CellType::Code, "").with_prompt(prompt))],
            );
            let value = notebook_to_value(&notebook).unwrap();
            assert_eq!(value["cells"][0]["execution_count"], Value::Null);
            assert_eq!(parse_notebook(&value).unwrap(), notebook);
        }
    }

    #[test]
    fn mistyped_reserved_metadata_is_rejected() {
        let value = json!({
            "cells": [{"cell_type": "code", "id": "c1", "metadata": {"language": 3},
                       "source": "", "outputs": []}],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5
        });
        let err = parse_notebook(&value).unwrap_err();
        assert!(matches!(err, FormatError::InvalidStructure(ref m) if m.contains("'c1'")));
    }
}
