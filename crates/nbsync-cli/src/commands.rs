//! Subcommand implementations
//!
//! Each command returns a report struct; `main` decides how to print it.

use crate::config::NbsyncConfig;
use anyhow::{bail, Context};
use nbsync_model::{CellType, Notebook};
use nbsync_protocol::Action;
use nbsync_session::{NullKernel, SessionContext, SessionManager};
use nbsync_storage::{FsStorage, NotebookStore, StorageConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Summary of one worksheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorksheetSummary {
    pub id: String,
    pub name: String,
    pub cells: usize,
}

/// What `inspect` reports about a notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotebookSummary {
    pub id: String,
    pub name: Option<String>,
    pub worksheets: Vec<WorksheetSummary>,
    pub code_cells: usize,
    pub markdown_cells: usize,
    pub heading_cells: usize,
    pub raw_cells: usize,
    pub outputs: usize,
}

impl NotebookSummary {
    #[must_use]
    pub fn of(notebook: &Notebook) -> Self {
        let cells = || notebook.worksheets.iter().flat_map(|ws| &ws.cells);
        let count = |kind: CellType| cells().filter(|cell| cell.cell_type == kind).count();
        Self {
            id: notebook.id.clone(),
            name: notebook.name().map(String::from),
            worksheets: notebook
                .worksheets
                .iter()
                .map(|ws| WorksheetSummary {
                    id: ws.id.clone(),
                    name: ws.name.clone(),
                    cells: ws.cells.len(),
                })
                .collect(),
            code_cells: count(CellType::Code),
            markdown_cells: count(CellType::Markdown),
            heading_cells: count(CellType::Heading),
            raw_cells: count(CellType::Raw),
            outputs: cells().map(|cell| cell.outputs.len()).sum(),
        }
    }

    /// Human-readable form
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("notebook {}", self.id);
        if let Some(name) = &self.name {
            out.push_str(&format!(" ({name})"));
        }
        out.push('\n');
        for ws in &self.worksheets {
            out.push_str(&format!("  worksheet {} \"{}\": {} cells\n", ws.id, ws.name, ws.cells));
        }
        out.push_str(&format!(
            "  code {}, markdown {}, heading {}, raw {}, outputs {}\n",
            self.code_cells, self.markdown_cells, self.heading_cells, self.raw_cells, self.outputs
        ));
        out
    }
}

/// Outcome of `apply`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub applied: usize,
    pub rejected: usize,
    pub created: bool,
    pub cells: usize,
}

/// Store rooted at the file's directory, addressing it by file name
///
/// Lets single-file commands reuse the atomic writes of [`FsStorage`] for
/// paths anywhere on disk.
fn file_store(path: &Path, storage: &StorageConfig) -> anyhow::Result<(NotebookStore, PathBuf)> {
    let name = path
        .file_name()
        .with_context(|| format!("{} is not a file path", path.display()))?;
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let store = NotebookStore::new(Arc::new(FsStorage::new(root)), storage);
    Ok((store, PathBuf::from(name)))
}

/// Read a notebook file in any registered format
///
/// # Errors
/// Missing file, unknown extension or unparsable contents
pub async fn load(path: &Path, config: &NbsyncConfig) -> anyhow::Result<Notebook> {
    let storage = config.storage.clone().with_create_on_read(false);
    let (store, name) = file_store(path, &storage)?;
    let loaded = store
        .read(&name)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(loaded.notebook)
}

/// Convert between formats, chosen by the file extensions
///
/// # Errors
/// Any read, parse, encode or write failure
pub async fn convert(input: &Path, output: &Path, config: &NbsyncConfig) -> anyhow::Result<NotebookSummary> {
    let notebook = load(input, config).await?;
    let (store, name) = file_store(output, &config.storage)?;
    let bytes = store
        .write(&name, &notebook)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes,
        "converted notebook"
    );
    Ok(NotebookSummary::of(&notebook))
}

/// Summarize a notebook file
///
/// # Errors
/// As [`load`]
pub async fn inspect(path: &Path, config: &NbsyncConfig) -> anyhow::Result<NotebookSummary> {
    let notebook = load(path, config).await?;
    Ok(NotebookSummary::of(&notebook))
}

/// Parse newline-delimited JSON actions; blank lines and `#` comments are skipped
///
/// # Errors
/// The first malformed line, with its line number
pub fn parse_actions(input: &str) -> anyhow::Result<Vec<Action>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            Action::from_json(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

/// Apply actions to a document under `config.storage.root` through a session,
/// then save it
///
/// Rejected actions abort the run unless `keep_going` is set, in which case
/// they are logged and counted.
///
/// # Errors
/// Load or save failures, or the first rejection without `keep_going`
pub async fn apply(
    document: &Path,
    actions: Vec<Action>,
    keep_going: bool,
    config: &NbsyncConfig,
) -> anyhow::Result<ApplyReport> {
    let backend = Arc::new(FsStorage::new(&config.storage.root));
    let store = NotebookStore::new(backend, &config.storage);
    let manager = SessionManager::new(SessionContext::new(
        store,
        Arc::new(NullKernel),
        config.session.clone(),
    ));
    let client_id = format!("cli-{}", uuid::Uuid::new_v4());

    let outcome = run_actions(&manager, document, &client_id, actions, keep_going).await;
    manager.shutdown().await;
    outcome
}

async fn run_actions(
    manager: &SessionManager,
    document: &Path,
    client_id: &str,
    actions: Vec<Action>,
    keep_going: bool,
) -> anyhow::Result<ApplyReport> {
    let subscription = manager
        .subscribe(document, client_id)
        .await
        .with_context(|| format!("opening {}", document.display()))?;
    let mut report = ApplyReport {
        created: manager
            .document_info(document)
            .await
            .is_some_and(|info| info.dirty),
        ..ApplyReport::default()
    };

    for (index, action) in actions.into_iter().enumerate() {
        let kind = action.kind();
        match manager.apply_action(document, client_id, action).await {
            Ok(_) => report.applied += 1,
            Err(e) if keep_going && e.is_rejection() => {
                tracing::warn!(action = index + 1, kind, error = %e, "skipping rejected action");
                report.rejected += 1;
            }
            Err(e) => bail!("action {} ({kind}) failed: {e}", index + 1),
        }
    }

    manager
        .save(document)
        .await
        .with_context(|| format!("saving {}", document.display()))?;
    if let Some(info) = manager.document_info(document).await {
        report.cells = info.cells;
    }
    manager.unsubscribe(document, &subscription.client_id).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsync_model::{Cell, Worksheet};

    #[test]
    fn parse_actions_skips_blank_and_comments() {
        let input = r#"
# seed the notebook
{"action":"action.worksheet.addCell","worksheetId":"ws1","cellId":"c1","type":"code","source":"1"}

{"action":"action.notebook.rename","name":"Demo"}
"#;
        let actions = parse_actions(input).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].kind(), "action.notebook.rename");
    }

    #[test]
    fn parse_actions_reports_line() {
        let err = parse_actions("{\"action\":\"action.notebook.rename\",\"name\":\"x\"}\n{oops}\n").unwrap_err();
        assert_eq!(err.to_string(), "line 2");
    }

    #[test]
    fn summary_counts() {
        let notebook = Notebook::new(
            "nb",
            vec![Worksheet::new("ws1", "Main")
                .with_cell(Cell::new("a", CellType::Markdown, "# A"))
                .with_cell(
                    Cell::new("b", CellType::Code, "1")
                        .with_output(nbsync_model::CellOutput::text(nbsync_model::OutputType::Stdout, "1")),
                )],
        );
        let summary = NotebookSummary::of(&notebook);
        assert_eq!(summary.code_cells, 1);
        assert_eq!(summary.markdown_cells, 1);
        assert_eq!(summary.outputs, 1);
        assert!(summary.to_text().contains("worksheet ws1 \"Main\": 2 cells"));
    }
}
