//! Testing utilities for the nbsync workspace
//!
//! Shared fixtures, action shorthands and proptest strategies.

#![allow(missing_docs)]

use nbsync_model::{Cell, CellOutput, CellType, Metadata, MetadataValue, Notebook, OutputType, Worksheet};
use nbsync_protocol::{apply, Action, AddCell, CellRef, CellUpdate, MoveCell, ProtocolError, Rename};
use proptest::prelude::*;

/// Worksheet ids used by [`two_worksheet_notebook`] and the strategies
pub const WORKSHEET_IDS: &[&str] = &["ws1", "ws2"];

/// Small cell id pool so generated actions collide often
pub const CELL_IDS: &[&str] = &["a", "b", "c", "d", "e"];

/// Notebook with two empty worksheets `ws1` and `ws2`
pub fn two_worksheet_notebook() -> Notebook {
    Notebook::new(
        "nb-test",
        vec![Worksheet::new("ws1", "First"), Worksheet::new("ws2", "Second")],
    )
}

/// Notebook with one worksheet holding a markdown and two code cells
pub fn sample_notebook() -> Notebook {
    Notebook::new(
        "nb-sample",
        vec![Worksheet::new("ws1", "Main")
            .with_cell(Cell::new("intro", CellType::Markdown, "# Sample\n\nText"))
            .with_cell(Cell::new("load", CellType::Code, "x = 1").with_prompt("1"))
            .with_cell(
                Cell::new("show", CellType::Code, "print(x)")
                    .with_prompt("2")
                    .with_output(stdout("1\n")),
            )],
    )
}

pub fn stdout(text: &str) -> CellOutput {
    CellOutput::text(OutputType::Stdout, text)
}

pub fn result(text: &str) -> CellOutput {
    CellOutput::text(OutputType::Result, text)
}

pub fn add_code(worksheet_id: &str, cell_id: &str, source: &str) -> Action {
    AddCell::new(worksheet_id, cell_id, CellType::Code, source).into()
}

pub fn add_code_after(worksheet_id: &str, cell_id: &str, source: &str, anchor: &str) -> Action {
    AddCell::new(worksheet_id, cell_id, CellType::Code, source)
        .after(anchor)
        .into()
}

pub fn append_output(worksheet_id: &str, cell_id: &str, output: CellOutput) -> Action {
    CellUpdate::new(worksheet_id, cell_id)
        .append_outputs(vec![output])
        .into()
}

pub fn set_source(worksheet_id: &str, cell_id: &str, source: &str) -> Action {
    CellUpdate::new(worksheet_id, cell_id).with_source(source).into()
}

pub fn delete(worksheet_id: &str, cell_id: &str) -> Action {
    Action::DeleteCell(CellRef::new(worksheet_id, cell_id))
}

pub fn execute(worksheet_id: &str, cell_id: &str) -> Action {
    Action::Execute(CellRef::new(worksheet_id, cell_id))
}

/// Apply actions in order, collecting each outcome
pub fn apply_all(notebook: &mut Notebook, actions: &[Action]) -> Vec<Result<(), ProtocolError>> {
    actions
        .iter()
        .map(|action| apply(notebook, action).map(|_| ()))
        .collect()
}

/// Cell ids of a worksheet, owned
pub fn cell_ids(notebook: &Notebook, worksheet_id: &str) -> Vec<String> {
    notebook
        .worksheet_or_err(worksheet_id)
        .map(|ws| ws.cell_ids().into_iter().map(String::from).collect())
        .unwrap_or_default()
}

fn arb_worksheet_id() -> impl Strategy<Value = String> {
    prop::sample::select(WORKSHEET_IDS).prop_map(String::from)
}

fn arb_cell_id() -> impl Strategy<Value = String> {
    prop::sample::select(CELL_IDS).prop_map(String::from)
}

fn arb_anchor() -> impl Strategy<Value = Option<String>> {
    prop::option::of(arb_cell_id())
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-z =+()]{1,12}",
        "[a-z ]{0,8}\n[a-z ]{0,8}\n?",
    ]
}

fn arb_cell_type() -> impl Strategy<Value = CellType> {
    prop_oneof![
        Just(CellType::Code),
        Just(CellType::Markdown),
        Just(CellType::Heading),
        Just(CellType::Raw),
    ]
}

fn arb_output_type() -> impl Strategy<Value = OutputType> {
    prop_oneof![
        Just(OutputType::Stdout),
        Just(OutputType::Stderr),
        Just(OutputType::Error),
        Just(OutputType::Result),
    ]
}

fn arb_mime() -> impl Strategy<Value = String> {
    prop::sample::select(&["text/plain", "text/html", "image/png", "application/vnd.nbsync+json"][..])
        .prop_map(String::from)
}

fn arb_error_details() -> impl Strategy<Value = Metadata> {
    ("[A-Z][a-z]{0,8}Error", arb_text(), prop::collection::vec("[a-z ]{0,10}", 0..3)).prop_map(
        |(name, message, traceback)| {
            let mut details = Metadata::new();
            details.insert("errorName".into(), name.into());
            details.insert("errorMessage".into(), message.into());
            details.insert(
                "traceback".into(),
                MetadataValue::Array(traceback.into_iter().map(MetadataValue::from).collect()),
            );
            let mut metadata = Metadata::new();
            metadata.insert("errorDetails".into(), MetadataValue::Map(details));
            metadata
        },
    )
}

/// Outputs of every type, including bundles without `text/plain` and
/// outputs carrying metadata
pub fn arb_output() -> impl Strategy<Value = CellOutput> {
    prop_oneof![
        3 => (arb_output_type(), arb_text()).prop_map(|(output_type, text)| CellOutput::text(output_type, text)),
        2 => (
            arb_output_type(),
            prop::collection::btree_map(arb_mime(), arb_text(), 0..3),
            arb_metadata(),
        )
            .prop_map(|(output_type, mimetype_bundle, metadata)| CellOutput {
                output_type,
                mimetype_bundle,
                metadata,
            }),
        1 => (arb_text(), arb_error_details(), arb_metadata()).prop_map(|(text, details, extra)| {
            let mut output = CellOutput::text(OutputType::Error, text);
            output.metadata = details;
            output.metadata.extend(extra);
            output
        }),
    ]
}

/// Prompts: execution counts plus the busy marker and text that only
/// looks numeric
pub fn arb_prompt() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => (0u32..50).prop_map(|n| n.to_string()),
        1 => Just("*".to_string()),
        1 => Just("03".to_string()),
        1 => Just(String::new()),
    ]
}

/// Cell metadata, sometimes using keys clients may not set or giving a
/// reserved key the wrong type
pub fn arb_metadata() -> impl Strategy<Value = Metadata> {
    let leaf = prop_oneof![
        Just(MetadataValue::Null),
        any::<bool>().prop_map(MetadataValue::Bool),
        (-1000i64..1000).prop_map(MetadataValue::Int),
        "[a-z]{0,6}".prop_map(MetadataValue::String),
    ];
    let value = leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(MetadataValue::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..3).prop_map(MetadataValue::Map),
        ]
    });
    prop::collection::btree_map(
        prop::sample::select(
            &["tags", "owner", "score", "scrolled", "collapsed", "id", "prompt"][..],
        )
        .prop_map(String::from),
        value,
        0..3,
    )
}

/// Any single non-composite action over the fixture id pools
pub fn arb_simple_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (arb_worksheet_id(), arb_cell_id(), arb_cell_type(), arb_text(), arb_anchor())
            .prop_map(|(ws, id, cell_type, source, anchor)| {
                let mut add = AddCell::new(ws, id, cell_type, source);
                add.insert_after = anchor;
                if cell_type == CellType::Heading {
                    let mut metadata = Metadata::new();
                    metadata.insert("level".into(), MetadataValue::Int(2));
                    add.metadata = Some(metadata);
                }
                Action::AddCell(add)
            }),
        1 => (arb_worksheet_id(), arb_cell_id()).prop_map(|(ws, id)| delete(&ws, &id)),
        2 => (arb_worksheet_id(), arb_worksheet_id(), arb_cell_id(), arb_anchor()).prop_map(
            |(from, to, id, anchor)| {
                let mut mv = MoveCell::between(from, to, id);
                mv.insert_after = anchor;
                Action::MoveCell(mv)
            }
        ),
        2 => (arb_worksheet_id(), arb_cell_id(), prop::collection::vec(arb_output(), 0..3), any::<bool>())
            .prop_map(|(ws, id, outputs, replace)| {
                let update = CellUpdate::new(ws, id);
                let update = if replace {
                    update.replace_outputs(outputs)
                } else {
                    update.append_outputs(outputs)
                };
                Action::UpdateCell(update)
            }),
        1 => (arb_worksheet_id(), arb_cell_id(), arb_text(), prop::option::of(arb_prompt()))
            .prop_map(|(ws, id, source, prompt)| {
                let mut update = CellUpdate::new(ws, id).with_source(source);
                update.prompt = prompt;
                Action::UpdateCell(update)
            }),
        1 => (arb_worksheet_id(), arb_cell_id(), arb_metadata(), any::<bool>())
            .prop_map(|(ws, id, metadata, replace)| {
                let update = CellUpdate::new(ws, id);
                Action::UpdateCell(if replace {
                    update.replace_metadata(metadata)
                } else {
                    update.merge_metadata(metadata)
                })
            }),
        1 => (arb_worksheet_id(), arb_cell_id())
            .prop_map(|(ws, id)| Action::ClearOutput(CellRef::new(ws, id))),
        1 => Just(Action::ClearOutputs),
        1 => "[A-Za-z ]{1,10}".prop_map(|name| Action::Rename(Rename { name })),
        1 => (arb_worksheet_id(), arb_cell_id()).prop_map(|(ws, id)| execute(&ws, &id)),
    ]
}

/// Simple actions, occasionally grouped into composites
pub fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => arb_simple_action(),
        1 => prop::collection::vec(arb_simple_action(), 1..4).prop_map(Action::from),
    ]
}

pub fn arb_actions(max: usize) -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(arb_action(), 0..max)
}
