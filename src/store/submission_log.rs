//! Append-only CSV log of accepted submissions, one row per work unit.

use crate::store::error::StoreError;
use crate::types::batch::Batch;
use crate::types::work_unit::{ResumeKey, WorkUnit};
use chrono::NaiveDate;
use log::debug;
use polars::prelude::*;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

pub const SUBMISSION_LOG_FILE_NAME: &str = "requests.csv";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One logged work unit together with the task that covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    pub task_id: String,
    pub name: String,
    pub id: String,
    /// Stored in the `v` column.
    pub variable: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub count: i64,
    pub timeline_section: i32,
    pub agg_period: i64,
}

impl SubmissionRow {
    pub fn from_unit(task_id: &str, unit: &WorkUnit) -> Self {
        Self {
            task_id: task_id.to_string(),
            name: unit.name.clone(),
            id: unit.id.clone(),
            variable: unit.variable.clone(),
            from: unit.from,
            to: unit.to,
            count: unit.count,
            timeline_section: unit.timeline_section,
            agg_period: unit.agg_period,
        }
    }

    pub fn resume_key(&self) -> ResumeKey {
        ResumeKey {
            id: self.id.clone(),
            variable: self.variable.clone(),
            timeline_section: self.timeline_section,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionLog {
    path: PathBuf,
}

impl SubmissionLog {
    pub fn new(workspace: &Path) -> Self {
        Self {
            path: workspace.join(SUBMISSION_LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All logged rows; an absent or empty log reads as empty.
    pub async fn read(&self) -> Result<Vec<SubmissionRow>, StoreError> {
        let path = self.path.clone();
        task::spawn_blocking(move || read_rows(&path)).await?
    }

    /// Appends one row per member of `batch` under `task_id`.
    pub async fn append(&self, task_id: &str, batch: &Batch) -> Result<(), StoreError> {
        let rows: Vec<SubmissionRow> = batch
            .units()
            .iter()
            .map(|unit| SubmissionRow::from_unit(task_id, unit))
            .collect();
        let path = self.path.clone();
        task::spawn_blocking(move || append_rows(&path, &rows)).await?
    }
}

fn log_schema() -> Schema {
    let mut schema = Schema::with_capacity(9);
    for name in ["task_id", "name", "id", "v", "from", "to"] {
        schema.with_column(name.into(), DataType::String);
    }
    schema.with_column("count".into(), DataType::Int64);
    schema.with_column("timeline_section".into(), DataType::Int32);
    schema.with_column("agg_period".into(), DataType::Int64);
    schema
}

fn csv_error(path: &Path) -> impl Fn(PolarsError) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn series<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a Series, StoreError> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| StoreError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

fn read_rows(path: &Path) -> Result<Vec<SubmissionRow>, StoreError> {
    let empty = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if empty {
        return Ok(Vec::new());
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(Arc::new(log_schema())))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(csv_error(path))?
        .finish()
        .map_err(csv_error(path))?;

    let task_id = series(&df, path, "task_id")?.str().map_err(csv_error(path))?;
    let name = series(&df, path, "name")?.str().map_err(csv_error(path))?;
    let id = series(&df, path, "id")?.str().map_err(csv_error(path))?;
    let variable = series(&df, path, "v")?.str().map_err(csv_error(path))?;
    let from = series(&df, path, "from")?.str().map_err(csv_error(path))?;
    let to = series(&df, path, "to")?.str().map_err(csv_error(path))?;
    let count = series(&df, path, "count")?.i64().map_err(csv_error(path))?;
    let section = series(&df, path, "timeline_section")?.i32().map_err(csv_error(path))?;
    let agg_period = series(&df, path, "agg_period")?.i64().map_err(csv_error(path))?;

    let invalid = |row: usize, message: &str| StoreError::InvalidRow {
        path: path.to_path_buf(),
        row,
        message: message.to_string(),
    };
    let date = |row: usize, raw: Option<&str>| -> Result<NaiveDate, StoreError> {
        let raw = raw.ok_or_else(|| invalid(row, "missing date"))?;
        NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| invalid(row, &e.to_string()))
    };

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let text = |ca: &StringChunked, what: &str| {
            ca.get(i)
                .map(str::to_string)
                .ok_or_else(|| invalid(i, &format!("missing {what}")))
        };
        rows.push(SubmissionRow {
            task_id: text(task_id, "task_id")?,
            name: text(name, "name")?,
            id: text(id, "id")?,
            variable: text(variable, "v")?,
            from: date(i, from.get(i))?,
            to: date(i, to.get(i))?,
            count: count.get(i).unwrap_or(0),
            timeline_section: section
                .get(i)
                .ok_or_else(|| invalid(i, "missing timeline_section"))?,
            agg_period: agg_period.get(i).unwrap_or(0),
        });
    }
    debug!("Read {} submission rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn append_rows(path: &Path, rows: &[SubmissionRow]) -> Result<(), StoreError> {
    if rows.is_empty() {
        return Ok(());
    }
    let has_header = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

    let mut df = df!(
        "task_id" => rows.iter().map(|r| r.task_id.clone()).collect::<Vec<_>>(),
        "name" => rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
        "id" => rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
        "v" => rows.iter().map(|r| r.variable.clone()).collect::<Vec<_>>(),
        "from" => rows.iter().map(|r| r.from.format(DATE_FORMAT).to_string()).collect::<Vec<_>>(),
        "to" => rows.iter().map(|r| r.to.format(DATE_FORMAT).to_string()).collect::<Vec<_>>(),
        "count" => rows.iter().map(|r| r.count).collect::<Vec<_>>(),
        "timeline_section" => rows.iter().map(|r| r.timeline_section).collect::<Vec<_>>(),
        "agg_period" => rows.iter().map(|r| r.agg_period).collect::<Vec<_>>()
    )
    .map_err(csv_error(path))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
    CsvWriter::new(&mut file)
        .include_header(!has_header)
        .finish(&mut df)
        .map_err(csv_error(path))?;
    file.sync_all()
        .map_err(|e| StoreError::Write(path.to_path_buf(), e))
}
