pub mod error;
pub mod invalid_tasks;
pub mod payload_log;
pub mod submission_log;

use crate::backlog::resume_filter;
use crate::store::error::StoreError;
use crate::store::invalid_tasks::load_invalid_tasks;
use crate::store::payload_log::PayloadLog;
use crate::store::submission_log::SubmissionLog;
use crate::types::batch::Batch;
use crate::types::payload::PayloadRecord;
use crate::types::work_unit::ResumeKey;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Everything persisted about past submissions in one workspace.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    workspace: PathBuf,
    submissions: SubmissionLog,
    payloads: PayloadLog,
}

/// Counts shown by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreSummary {
    pub tasks: usize,
    pub logged_units: usize,
    pub invalid_tasks: usize,
    pub satisfied_units: usize,
}

impl ResumeStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            submissions: SubmissionLog::new(workspace),
            payloads: PayloadLog::new(workspace),
        }
    }

    pub fn submissions(&self) -> &SubmissionLog {
        &self.submissions
    }

    pub fn payloads(&self) -> &PayloadLog {
        &self.payloads
    }

    pub async fn invalid_tasks(&self) -> Result<BTreeSet<String>, StoreError> {
        let workspace = self.workspace.clone();
        tokio::task::spawn_blocking(move || load_invalid_tasks(&workspace)).await?
    }

    /// Keys already covered by a valid submission.
    pub async fn satisfied_keys(&self) -> Result<HashSet<ResumeKey>, StoreError> {
        let rows = self.submissions.read().await?;
        let invalid = self.invalid_tasks().await?;
        Ok(resume_filter::satisfied_keys(&rows, &invalid))
    }

    /// Persists an accepted batch: its rows first, then its payload.
    pub async fn record(
        &self,
        task_id: &str,
        batch: &Batch,
        payload: &PayloadRecord,
    ) -> Result<(), StoreError> {
        self.submissions.append(task_id, batch).await?;
        self.payloads.insert(task_id, payload).await
    }

    pub async fn summary(&self) -> Result<StoreSummary, StoreError> {
        let rows = self.submissions.read().await?;
        let invalid = self.invalid_tasks().await?;
        let tasks: HashSet<&str> = rows.iter().map(|r| r.task_id.as_str()).collect();
        Ok(StoreSummary {
            tasks: tasks.len(),
            logged_units: rows.len(),
            invalid_tasks: invalid.len(),
            satisfied_units: resume_filter::satisfied_keys(&rows, &invalid).len(),
        })
    }
}
