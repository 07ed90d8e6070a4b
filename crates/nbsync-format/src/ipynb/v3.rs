//! nbformat 3: worksheets of cells, `input` for code, short output keys

use super::{
    as_array, as_object, check_cell_metadata, error_text, execution_count, join_text,
    metadata_from, metadata_to, mime_for_short_key, short_key_for_mime, split_lines, take_string,
    IdAllocator, ERROR_DETAILS_KEY, ID_KEY, NAME_KEY, PROMPT_KEY,
};
use crate::error::{FormatError, FormatResult};
use nbsync_model::{
    Cell, CellOutput, CellType, Metadata, MetadataValue, MimetypeBundle, Notebook, OutputType,
    Worksheet, STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME,
};
use serde_json::{json, Map, Value};

const NBFORMAT_MINOR: u64 = 0;

pub(super) fn parse_notebook(root: &Value) -> FormatResult<Notebook> {
    let root = as_object(root, "notebook")?;
    let mut metadata = metadata_from(root.get("metadata"))?;
    let id = take_string(&mut metadata, ID_KEY).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut worksheet_ids = IdAllocator::default();
    let mut worksheets = as_array(root.get("worksheets"), "worksheets")?
        .iter()
        .enumerate()
        .map(|(index, ws)| parse_worksheet(ws, index, &mut worksheet_ids))
        .collect::<FormatResult<Vec<_>>>()?;

    if worksheets.is_empty() {
        worksheets.push(Worksheet::new(STARTER_WORKSHEET_ID, STARTER_WORKSHEET_NAME));
    }

    Ok(Notebook {
        id,
        metadata,
        worksheets,
    })
}

fn parse_worksheet(value: &Value, index: usize, ids: &mut IdAllocator) -> FormatResult<Worksheet> {
    let ws = as_object(value, "worksheet")?;
    let mut metadata = metadata_from(ws.get("metadata"))?;
    let id = ids.claim(
        take_string(&mut metadata, ID_KEY),
        format!("ws{}", index + 1),
    );
    let name = take_string(&mut metadata, NAME_KEY)
        .unwrap_or_else(|| STARTER_WORKSHEET_NAME.to_string());

    let mut cell_ids = IdAllocator::default();
    let cells = as_array(ws.get("cells"), "cells")?
        .iter()
        .enumerate()
        .map(|(i, cell)| parse_cell(cell, i, &mut cell_ids))
        .collect::<FormatResult<Vec<_>>>()?;

    Ok(Worksheet {
        id,
        name,
        metadata,
        cells,
    })
}

fn parse_cell(value: &Value, index: usize, ids: &mut IdAllocator) -> FormatResult<Cell> {
    let obj = as_object(value, "cell")?;
    let mut metadata = metadata_from(obj.get("metadata"))?;
    let id = ids.claim(take_string(&mut metadata, ID_KEY), format!("c{}", index + 1));

    let cell_type = obj
        .get("cell_type")
        .and_then(Value::as_str)
        .ok_or_else(|| FormatError::structure("cell is missing 'cell_type'"))?;

    let mut cell = match cell_type {
        "code" => {
            if let Some(language) = obj.get("language").and_then(Value::as_str) {
                metadata.insert("language".into(), language.into());
            }
            if let Some(collapsed) = obj.get("collapsed").and_then(Value::as_bool) {
                metadata.insert("collapsed".into(), collapsed.into());
            }
            Cell::new(id, CellType::Code, join_text(obj.get("input"), "input")?)
        }
        "markdown" => Cell::new(id, CellType::Markdown, join_text(obj.get("source"), "source")?),
        "raw" => Cell::new(id, CellType::Raw, join_text(obj.get("source"), "source")?),
        "heading" => {
            if let Some(level) = obj.get("level").and_then(Value::as_i64) {
                metadata.insert("level".into(), level.into());
            }
            Cell::new(id, CellType::Heading, join_text(obj.get("source"), "source")?)
        }
        other => {
            return Err(FormatError::structure(format!(
                "unknown cell type '{other}'"
            )))
        }
    };

    // Any cell type may carry a prompt and outputs
    cell.prompt = obj
        .get("prompt_number")
        .and_then(Value::as_u64)
        .map(|n| n.to_string())
        .or_else(|| take_string(&mut metadata, PROMPT_KEY));
    cell.outputs = as_array(obj.get("outputs"), "outputs")?
        .iter()
        .map(parse_output)
        .collect::<FormatResult<Vec<_>>>()?;

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
    // Outputs written by nbsync always carry `metadata`; their bundle is
    // read back as written
    let exact = obj.contains_key("metadata");

    match output_type {
        "pyout" | "display_data" => exact_output(OutputType::Result, obj),
        "stream" => {
            let output_type = match obj.get("stream").and_then(Value::as_str) {
                Some("stderr") => OutputType::Stderr,
                _ => OutputType::Stdout,
            };
            if exact {
                exact_output(output_type, obj)
            } else {
                Ok(CellOutput::text(output_type, join_text(obj.get("text"), "text")?))
            }
        }
        "pyerr" if exact => exact_output(OutputType::Error, obj),
        "pyerr" => parse_error_output(obj),
        other => Err(FormatError::structure(format!(
            "unknown output type '{other}'"
        ))),
    }
}

/// Output whose bundle is every MIME-shaped key plus its `metadata`
fn exact_output(output_type: OutputType, obj: &Map<String, Value>) -> FormatResult<CellOutput> {
    let mut bundle = MimetypeBundle::new();
    for (key, content) in obj {
        let mime = match mime_for_short_key(key) {
            Some(mime) => mime.to_string(),
            None if key.contains('/') => key.clone(),
            None => continue,
        };
        bundle.insert(mime, join_text(Some(content), key)?);
    }
    Ok(CellOutput {
        output_type,
        mimetype_bundle: bundle,
        metadata: metadata_from(obj.get("metadata"))?,
    })
}

/// Shared by v3 `pyerr` and v4 `error` outputs
pub(super) fn parse_error_output(obj: &Map<String, Value>) -> FormatResult<CellOutput> {
    let ename = obj.get("ename").and_then(Value::as_str).unwrap_or_default();
    let evalue = obj.get("evalue").and_then(Value::as_str).unwrap_or_default();
    let traceback = as_array(obj.get("traceback"), "traceback")?
        .iter()
        .map(|line| {
            line.as_str()
                .map(MetadataValue::from)
                .ok_or_else(|| FormatError::structure("traceback lines must be strings"))
        })
        .collect::<FormatResult<Vec<_>>>()?;

    let mut output = CellOutput::text(OutputType::Error, error_text(ename, evalue));
    if !ename.is_empty() || !traceback.is_empty() {
        let mut details = Metadata::new();
        details.insert("errorName".into(), ename.into());
        details.insert("errorMessage".into(), evalue.into());
        details.insert("traceback".into(), MetadataValue::Array(traceback));
        output
            .metadata
            .insert(ERROR_DETAILS_KEY.into(), MetadataValue::Map(details));
    }
    Ok(output)
}

/// `(ename, evalue, traceback)` for an error output
pub(super) fn error_fields(output: &CellOutput) -> (String, String, Vec<Value>) {
    let details = output
        .metadata
        .get(ERROR_DETAILS_KEY)
        .and_then(MetadataValue::as_map);

    match details {
        Some(details) => {
            let field = |key: &str| {
                details
                    .get(key)
                    .and_then(MetadataValue::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            let traceback = match details.get("traceback") {
                Some(MetadataValue::Array(lines)) => lines
                    .iter()
                    .filter_map(MetadataValue::as_str)
                    .map(|line| Value::String(line.to_string()))
                    .collect(),
                _ => Vec::new(),
            };
            (field("errorName"), field("errorMessage"), traceback)
        }
        None => (
            String::new(),
            output.plain_text().unwrap_or_default().to_string(),
            Vec::new(),
        ),
    }
}

pub(super) fn notebook_to_value(notebook: &Notebook) -> FormatResult<Value> {
    let mut metadata = metadata_to(&notebook.metadata)?;
    metadata.insert(ID_KEY.into(), Value::String(notebook.id.clone()));

    let worksheets = notebook
        .worksheets
        .iter()
        .map(worksheet_to_value)
        .collect::<FormatResult<Vec<_>>>()?;

    Ok(json!({
        "metadata": metadata,
        "nbformat": 3,
        "nbformat_minor": NBFORMAT_MINOR,
        "worksheets": worksheets,
    }))
}

fn worksheet_to_value(worksheet: &Worksheet) -> FormatResult<Value> {
    let mut metadata = metadata_to(&worksheet.metadata)?;
    metadata.insert(ID_KEY.into(), Value::String(worksheet.id.clone()));
    metadata.insert(NAME_KEY.into(), Value::String(worksheet.name.clone()));

    let cells = worksheet
        .cells
        .iter()
        .map(cell_to_value)
        .collect::<FormatResult<Vec<_>>>()?;

    Ok(json!({
        "cells": cells,
        "metadata": metadata,
    }))
}

fn cell_to_value(cell: &Cell) -> FormatResult<Value> {
    let mut metadata = cell.metadata.clone();
    let mut obj = Map::new();
    obj.insert("cell_type".into(), Value::String(cell.cell_type.as_str().into()));

    match cell.cell_type {
        CellType::Code => {
            if let Some(MetadataValue::String(language)) = metadata.remove("language") {
                obj.insert("language".into(), Value::String(language));
            }
            if let Some(MetadataValue::Bool(collapsed)) = metadata.remove("collapsed") {
                obj.insert("collapsed".into(), Value::Bool(collapsed));
            }
            obj.insert("input".into(), split_lines(&cell.source));
        }
        CellType::Heading => {
            if let Some(MetadataValue::Int(level)) = metadata.remove("level") {
                obj.insert("level".into(), Value::from(level));
            }
            obj.insert("source".into(), split_lines(&cell.source));
        }
        CellType::Markdown | CellType::Raw => {
            obj.insert("source".into(), split_lines(&cell.source));
        }
    }

    if let Some(prompt) = &cell.prompt {
        match execution_count(prompt) {
            Some(n) => {
                obj.insert("prompt_number".into(), Value::from(n));
            }
            None => {
                metadata.insert(PROMPT_KEY.into(), prompt.clone().into());
            }
        }
    }
    if cell.cell_type == CellType::Code || !cell.outputs.is_empty() {
        let outputs = cell
            .outputs
            .iter()
            .map(output_to_value)
            .collect::<FormatResult<Vec<_>>>()?;
        obj.insert("outputs".into(), Value::Array(outputs));
    }

    let mut metadata = metadata_to(&metadata)?;
    metadata.insert(ID_KEY.into(), Value::String(cell.id.clone()));
    obj.insert("metadata".into(), Value::Object(metadata));
    Ok(Value::Object(obj))
}

fn output_to_value(output: &CellOutput) -> FormatResult<Value> {
    let mut obj = Map::new();
    match output.output_type {
        OutputType::Result => {
            obj.insert("output_type".into(), "pyout".into());
        }
        OutputType::Stdout | OutputType::Stderr => {
            let stream = if output.output_type == OutputType::Stderr {
                "stderr"
            } else {
                "stdout"
            };
            obj.insert("output_type".into(), "stream".into());
            obj.insert("stream".into(), stream.into());
        }
        OutputType::Error => {
            let (ename, evalue, traceback) = error_fields(output);
            obj.insert("output_type".into(), "pyerr".into());
            obj.insert("ename".into(), Value::String(ename));
            obj.insert("evalue".into(), Value::String(evalue));
            obj.insert("traceback".into(), Value::Array(traceback));
        }
    }
    // `text/plain` lands on `text`, which is also the stream payload key
    for (mime, content) in &output.mimetype_bundle {
        let key = short_key_for_mime(mime).unwrap_or(mime.as_str());
        obj.insert(key.to_string(), split_lines(content));
    }
    obj.insert(
        "metadata".into(),
        Value::Object(metadata_to(&output.metadata)?),
    );
    Ok(Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_v3() -> Value {
        json!({
            "metadata": {"name": "demo", "orig_nbformat": 2},
            "nbformat": 3,
            "nbformat_minor": 0,
            "worksheets": [{
                "cells": [
                    {"cell_type": "heading", "level": 1, "metadata": {}, "source": ["Title"]},
                    {"cell_type": "markdown", "metadata": {}, "source": ["line one\n", "line two"]},
                    {
                        "cell_type": "code",
                        "collapsed": false,
                        "input": ["x = 1\n", "x + 1"],
                        "language": "python",
                        "metadata": {},
                        "prompt_number": 3,
                        "outputs": [
                            {"output_type": "stream", "stream": "stdout", "text": ["hi\n"]},
                            {"output_type": "pyout", "prompt_number": 3, "text": ["2"],
                             "html": ["<b>2</b>"], "metadata": {}},
                            {"output_type": "pyerr", "ename": "ValueError",
                             "evalue": "bad", "traceback": ["tb1", "tb2"]}
                        ]
                    }
                ],
                "metadata": {}
            }]
        })
    }

    #[test]
    fn parses_jupyter_v3_file() {
        let notebook = parse_notebook(&sample_v3()).unwrap();

        assert_eq!(notebook.metadata.get("name"), Some(&MetadataValue::from("demo")));
        assert_eq!(
            notebook.metadata.get("orig_nbformat"),
            Some(&MetadataValue::Int(2))
        );
        assert_eq!(notebook.worksheets.len(), 1);

        let ws = &notebook.worksheets[0];
        assert_eq!(ws.id, "ws1");
        assert_eq!(ws.cell_ids(), vec!["c1", "c2", "c3"]);

        let heading = &ws.cells[0];
        assert_eq!(heading.cell_type, CellType::Heading);
        assert_eq!(heading.heading_level(), Ok(Some(1)));

        assert_eq!(ws.cells[1].source, "line one\nline two");

        let code = &ws.cells[2];
        assert_eq!(code.source, "x = 1\nx + 1");
        assert_eq!(code.language(), Ok(Some("python")));
        assert_eq!(code.is_collapsed(), Ok(false));
        assert_eq!(code.prompt.as_deref(), Some("3"));
        assert_eq!(code.outputs.len(), 3);
        assert_eq!(code.outputs[0].output_type, OutputType::Stdout);
        assert_eq!(code.outputs[0].plain_text(), Some("hi\n"));
        assert_eq!(code.outputs[1].mimetype_bundle["text/html"], "<b>2</b>");
        assert_eq!(code.outputs[1].plain_text(), Some("2"));
        assert_eq!(code.outputs[2].plain_text(), Some("ValueError: bad"));
    }

    #[test]
    fn writes_reserved_identity_keys() {
        let notebook = parse_notebook(&sample_v3()).unwrap();
        let value = notebook_to_value(&notebook).unwrap();

        assert_eq!(value["nbformat"], json!(3));
        assert_eq!(value["metadata"]["id"], json!(notebook.id));
        assert_eq!(value["worksheets"][0]["metadata"]["id"], json!("ws1"));
        assert_eq!(value["worksheets"][0]["cells"][2]["metadata"]["id"], json!("c3"));
        assert_eq!(value["worksheets"][0]["cells"][2]["language"], json!("python"));
        assert_eq!(value["worksheets"][0]["cells"][2]["prompt_number"], json!(3));
    }

    #[test]
    fn reparse_is_identity() {
        let notebook = parse_notebook(&sample_v3()).unwrap();
        let again = parse_notebook(&notebook_to_value(&notebook).unwrap()).unwrap();
        assert_eq!(again, notebook);
    }

    #[test]
    fn unknown_cell_type_rejected() {
        let value = json!({
            "nbformat": 3,
            "worksheets": [{"cells": [{"cell_type": "widget"}]}]
        });
        assert!(matches!(
            parse_notebook(&value),
            Err(FormatError::InvalidStructure(_))
        ));
    }

    #[test]
    fn missing_worksheets_yield_starter_sheet() {
        let notebook = parse_notebook(&json!({"nbformat": 3, "metadata": {}})).unwrap();
        assert_eq!(notebook.worksheets.len(), 1);
        assert_eq!(notebook.worksheets[0].id, STARTER_WORKSHEET_ID);
    }

    #[test]
    fn plain_error_output_round_trips() {
        let output = CellOutput::text(OutputType::Error, "boom");
        let value = output_to_value(&output).unwrap();
        assert_eq!(value["ename"], json!(""));
        assert_eq!(parse_output(&value).unwrap(), output);
    }

    #[test]
    fn non_numeric_prompts_move_to_metadata() {
        for prompt in ["*", "03", ""] {
            let cell = Cell::new("c", CellType::Code, "sleep()").with_prompt(prompt);
            let value = cell_to_value(&cell).unwrap();
            assert!(value.get("prompt_number").is_none());
            assert_eq!(value["metadata"]["prompt"], json!(prompt));
            assert_eq!(parse_cell(&value, 0, &mut IdAllocator::default()).unwrap(), cell);
        }

        let cell = Cell::new("c", CellType::Code, "").with_prompt("12");
        let value = cell_to_value(&cell).unwrap();
        assert_eq!(value["prompt_number"], json!(12));
        assert!(value["metadata"].get("prompt").is_none());
    }

    #[test]
    fn text_cells_keep_outputs_and_prompt() {
        let cell = Cell::new("m", CellType::Markdown, "# notes")
            .with_prompt("4")
            .with_output(CellOutput::text(OutputType::Stdout, "side effect"));
        let value = cell_to_value(&cell).unwrap();
        assert_eq!(value["outputs"][0]["output_type"], json!("stream"));
        assert_eq!(parse_cell(&value, 0, &mut IdAllocator::default()).unwrap(), cell);

        let bare = cell_to_value(&Cell::new("r", CellType::Raw, "x")).unwrap();
        assert!(bare.get("outputs").is_none());
    }

    #[test]
    fn error_output_keeps_its_metadata() {
        let mut details = Metadata::new();
        details.insert("errorName".into(), "ZeroDivisionError".into());
        details.insert("errorMessage".into(), "division by zero".into());
        details.insert("traceback".into(), MetadataValue::Array(vec!["tb".into()]));
        let output = CellOutput::text(OutputType::Error, "ZeroDivisionError: division by zero")
            .with_metadata(ERROR_DETAILS_KEY, details)
            .with_metadata("source", "kernel");

        let value = output_to_value(&output).unwrap();
        assert_eq!(value["ename"], json!("ZeroDivisionError"));
        assert_eq!(value["traceback"], json!(["tb"]));
        assert_eq!(parse_output(&value).unwrap(), output);
    }

    #[test]
    fn stream_without_plain_text_round_trips() {
        let output = CellOutput::new(OutputType::Stderr).with_mime("text/html", "<i>warn</i>");
        let value = output_to_value(&output).unwrap();
        assert!(value.get("text").is_none());
        assert_eq!(parse_output(&value).unwrap(), output);
    }

    #[test]
    fn out_of_range_heading_level_is_rejected() {
        let value = json!({
            "nbformat": 3,
            "worksheets": [{"cells": [{"cell_type": "heading", "level": 9, "source": "x"}]}]
        });
        let err = parse_notebook(&value).unwrap_err();
        assert!(matches!(err, FormatError::InvalidStructure(ref m) if m.contains("level 9")));
    }
}
