use crate::store::error::StoreError;
use crate::types::payload::PayloadRecord;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

pub const PAYLOAD_LOG_FILE_NAME: &str = "payloads.json";

/// JSON object of every accepted request payload, keyed by task id.
///
/// Each insert rewrites the whole document through a temporary file in the
/// same directory, so a crash leaves either the old or the new version.
#[derive(Debug, Clone)]
pub struct PayloadLog {
    path: PathBuf,
}

impl PayloadLog {
    pub fn new(workspace: &Path) -> Self {
        Self {
            path: workspace.join(PAYLOAD_LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entries(&self) -> Result<BTreeMap<String, PayloadRecord>, StoreError> {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let document = read_document(&path)?;
            document
                .into_iter()
                .map(|(task, value)| {
                    serde_json::from_value(value)
                        .map(|record| (task, record))
                        .map_err(|e| StoreError::Json(path.clone(), e))
                })
                .collect()
        })
        .await?
    }

    /// Adds (or replaces) the record of `task_id`. Entries this crate cannot
    /// decode are carried over untouched.
    pub async fn insert(&self, task_id: &str, record: &PayloadRecord) -> Result<(), StoreError> {
        let path = self.path.clone();
        let task_id = task_id.to_string();
        let value = serde_json::to_value(record).map_err(|e| StoreError::Json(path.clone(), e))?;
        task::spawn_blocking(move || {
            let mut document = read_document(&path)?;
            document.insert(task_id, value);
            write_document(&path, &document)
        })
        .await?
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>, StoreError> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let bytes = std::fs::read(path).map_err(|e| StoreError::Read(path.to_path_buf(), e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Json(path.to_path_buf(), e))
}

fn write_document(path: &Path, document: &Map<String, Value>) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let write_err = |e| StoreError::Write(path.to_path_buf(), e);
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), document)
        .map_err(|e| StoreError::Json(path.to_path_buf(), e))?;
    tmp.as_file_mut().flush().map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path)
        .map_err(|e| StoreError::Persist(path.to_path_buf(), e))?;
    Ok(())
}
