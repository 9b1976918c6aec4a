//! Task ids that must not count as done.
//!
//! Two sources: `invalid_tasks.txt`, free text (typically pasted from the
//! service's notification emails) scanned for task UUIDs, and any
//! `invalid/*.txt` CSV with a `task` column.

use crate::store::error::StoreError;
use log::debug;
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const INVALID_TASKS_FILE_NAME: &str = "invalid_tasks.txt";
pub const INVALID_TASKS_DIR_NAME: &str = "invalid";

static TASK_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("task id pattern is a valid regex")
});

/// Every distinct UUID-shaped token in `text`, lowercased.
pub fn extract_invalid_task_ids(text: &str) -> BTreeSet<String> {
    TASK_ID_RE
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// Union of both sources under `workspace`. Missing files contribute nothing.
pub fn load_invalid_tasks(workspace: &Path) -> Result<BTreeSet<String>, StoreError> {
    let mut tasks = BTreeSet::new();

    let text_path = workspace.join(INVALID_TASKS_FILE_NAME);
    if text_path.exists() {
        let text = std::fs::read_to_string(&text_path)
            .map_err(|e| StoreError::Read(text_path.clone(), e))?;
        tasks.extend(extract_invalid_task_ids(&text));
    }

    for path in override_files(&workspace.join(INVALID_TASKS_DIR_NAME))? {
        tasks.extend(read_task_column(&path)?);
    }
    debug!("{} task(s) flagged invalid", tasks.len());
    Ok(tasks)
}

fn override_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let read_err = |e| StoreError::Read(dir.to_path_buf(), e);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_task_column(path: &Path) -> Result<BTreeSet<String>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(csv_err)?
        .finish()
        .map_err(csv_err)?;
    let column = df.column("task").map_err(|_| StoreError::MissingColumn {
        path: path.to_path_buf(),
        column: "task".to_string(),
    })?;
    let column = column.cast(&DataType::String).map_err(csv_err)?;
    let tasks = column.as_materialized_series().str().map_err(csv_err)?;
    Ok(tasks
        .into_iter()
        .flatten()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
    const B: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    #[test]
    fn finds_ids_in_free_text() {
        let text = format!(
            "Your request {A} failed.\nRequest {} could not be served; see {A} again.",
            B.to_uppercase()
        );
        let ids = extract_invalid_task_ids(&text);
        assert_eq!(ids, BTreeSet::from([A.to_string(), B.to_string()]));
    }

    #[test]
    fn text_without_ids_yields_nothing() {
        assert!(extract_invalid_task_ids("nothing to see, 1234-5678").is_empty());
    }

    #[test]
    fn empty_workspace_has_no_invalid_tasks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_invalid_tasks(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn merges_text_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INVALID_TASKS_FILE_NAME), format!("failed: {A}")).unwrap();
        let overrides = dir.path().join(INVALID_TASKS_DIR_NAME);
        std::fs::create_dir(&overrides).unwrap();
        std::fs::write(overrides.join("manual.txt"), format!("task,reason\n{B},empty file\n"))
            .unwrap();
        std::fs::write(overrides.join("notes.md"), "ignored").unwrap();

        let tasks = load_invalid_tasks(dir.path()).unwrap();
        assert_eq!(tasks, BTreeSet::from([A.to_string(), B.to_string()]));
    }

    #[test]
    fn override_without_task_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = dir.path().join(INVALID_TASKS_DIR_NAME);
        std::fs::create_dir(&overrides).unwrap();
        std::fs::write(overrides.join("bad.txt"), "id\nx\n").unwrap();
        let err = load_invalid_tasks(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { ref column, .. } if column == "task"));
    }

    #[test]
    fn task_column_is_found_among_others() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = dir.path().join(INVALID_TASKS_DIR_NAME);
        std::fs::create_dir(&overrides).unwrap();
        std::fs::write(overrides.join("bad.txt"), format!("id,task\n7,{}\n", A.to_uppercase()))
            .unwrap();
        assert_eq!(load_invalid_tasks(dir.path()).unwrap(), BTreeSet::from([A.to_string()]));
    }
}
