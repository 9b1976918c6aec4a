//! Sequential submission of packed batches with retries and adaptive pacing.

use crate::store::error::StoreError;
use crate::store::ResumeStore;
use crate::submission::api::DataApi;
use crate::submission::error::SubmitError;
use crate::submission::pacing::{Pacer, PacingPolicy};
use crate::types::batch::Batch;
use crate::types::payload::RequestPayload;
use chrono::Utc;
use indicatif::ProgressBar;
use log::{error, info, warn};
use std::time::Duration;

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Submitted(String),
    /// Every attempt failed; the batch stays out of the submission log.
    Failed,
    /// The service refused this client; no further attempts were made.
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadReport {
    pub batches_submitted: usize,
    pub batches_failed: usize,
    pub batches_blocked: usize,
    pub units_submitted: usize,
    pub task_ids: Vec<String>,
    pub final_pause: Duration,
}

pub struct SubmissionLoop<'a> {
    api: &'a dyn DataApi,
    store: &'a ResumeStore,
    emails: Vec<String>,
    fmt: String,
    max_tries: u32,
    pacer: Pacer,
    email_index: usize,
    last_task: Option<String>,
}

impl<'a> SubmissionLoop<'a> {
    pub fn new(
        api: &'a dyn DataApi,
        store: &'a ResumeStore,
        emails: Vec<String>,
        fmt: &str,
        max_tries: u32,
        pacing: PacingPolicy,
    ) -> Self {
        Self {
            api,
            store,
            emails,
            fmt: fmt.to_string(),
            max_tries,
            pacer: Pacer::new(pacing),
            email_index: 0,
            last_task: None,
        }
    }

    /// Submits `batches` one after the other. Batch failures are contained;
    /// only a failure to persist an accepted batch is returned as an error.
    pub async fn run<I>(mut self, batches: I, progress: &ProgressBar) -> Result<DownloadReport, StoreError>
    where
        I: IntoIterator<Item = Batch>,
    {
        let mut report = DownloadReport::default();
        for batch in batches {
            match self.submit_batch(&batch, progress).await? {
                BatchOutcome::Submitted(task) => {
                    report.batches_submitted += 1;
                    report.units_submitted += batch.len();
                    report.task_ids.push(task);
                }
                BatchOutcome::Failed => report.batches_failed += 1,
                BatchOutcome::Blocked => report.batches_blocked += 1,
            }
            progress.inc(batch.len() as u64);
        }
        report.final_pause = self.pacer.current();
        info!(
            "Submitted {} batch(es), {} failed, {} blocked",
            report.batches_submitted, report.batches_failed, report.batches_blocked
        );
        Ok(report)
    }

    fn email(&self) -> &str {
        self.emails
            .get(self.email_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    async fn submit_batch(
        &mut self,
        batch: &Batch,
        progress: &ProgressBar,
    ) -> Result<BatchOutcome, StoreError> {
        for attempt in 1..=self.max_tries {
            let Some(payload) = RequestPayload::for_batch(batch, self.email(), &self.fmt) else {
                return Ok(BatchOutcome::Failed);
            };

            let outcome = match self.api.submit(&payload).await {
                Ok(task) => {
                    self.store
                        .record(&task, batch, &payload.record_at(Utc::now()))
                        .await?;
                    info!("Task {} covers {} unit(s)", task, batch.len());
                    progress.set_message(format!("OK: {task}"));
                    self.email_index = (self.email_index + 1) % self.emails.len().max(1);
                    if attempt == 1 {
                        self.pacer.reward();
                    }
                    self.last_task = Some(task.clone());
                    Some(BatchOutcome::Submitted(task))
                }
                Err(e @ SubmitError::Rejected { .. }) => {
                    self.pacer.penalize();
                    let message = self.failure_message(&e, attempt);
                    warn!("{message}");
                    progress.set_message(message);
                    e.is_terminal().then_some(BatchOutcome::Blocked)
                }
                Err(e) => {
                    error!(
                        "Exception '{}' while processing {{names: {:?}, ids: {:?}}}",
                        e,
                        batch.station_names(),
                        batch.station_ids()
                    );
                    progress.set_message(self.failure_message(&e, attempt));
                    None
                }
            };

            self.pacer.wait().await;
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
        Ok(BatchOutcome::Failed)
    }

    fn failure_message(&self, error: &SubmitError, attempt: u32) -> String {
        let reason = match error {
            SubmitError::Rejected { status, detail } => {
                format!("{} ({})", status.as_u16(), detail.as_deref().unwrap_or("none"))
            }
            other => other.to_string(),
        };
        format!(
            "Error: {} ({}/{}). Last successful task: {}",
            reason,
            attempt,
            self.max_tries,
            self.last_task.as_deref().unwrap_or("none")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::work_unit::WorkUnit;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Reply {
        Task(&'static str),
        Status(u16),
        Broken,
    }

    /// Replays a fixed script and records the email of every call.
    struct ScriptedApi {
        replies: Mutex<VecDeque<Reply>>,
        emails: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                emails: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.emails.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataApi for ScriptedApi {
        async fn submit(&self, payload: &RequestPayload) -> Result<String, SubmitError> {
            self.emails.lock().unwrap().push(payload.email.clone());
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Task(t)) => Ok(t.to_string()),
                Some(Reply::Status(code)) => Err(SubmitError::Rejected {
                    status: StatusCode::from_u16(code).unwrap(),
                    detail: Some("scripted".to_string()),
                }),
                Some(Reply::Broken) | None => Err(SubmitError::MissingTask("scripted".to_string())),
            }
        }
    }

    fn batch(id: &str) -> Batch {
        Batch::new(vec![WorkUnit {
            name: format!("Station {id}"),
            id: id.to_string(),
            variable: "3,0,86400/103,2000,-,-/B12101".to_string(),
            agg_code: 3,
            agg_period: 86400,
            from: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2000, 1, 10).unwrap(),
            count: 10,
            timeline_section: 0,
        }])
    }

    fn emails() -> Vec<String> {
        vec!["a@example.org".to_string(), "b@example.org".to_string()]
    }

    #[tokio::test(start_paused = true)]
    async fn forbidden_stops_retries_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path());
        let api = ScriptedApi::new(vec![Reply::Status(403), Reply::Task("never")]);
        let runner = SubmissionLoop::new(&api, &store, emails(), "csv", 5, PacingPolicy::default());

        let report = runner.run(vec![batch("x")], &ProgressBar::hidden()).await.unwrap();
        assert_eq!(api.calls().len(), 1);
        assert_eq!(report.batches_blocked, 1);
        assert_eq!(report.batches_submitted, 0);
        assert_eq!(report.final_pause, Duration::from_secs(130));
        assert!(store.submissions().read().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_batches_stay_unlogged() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path());
        let api = ScriptedApi::new(vec![Reply::Status(500), Reply::Broken, Reply::Status(429)]);
        let runner = SubmissionLoop::new(&api, &store, emails(), "csv", 3, PacingPolicy::default());

        let report = runner.run(vec![batch("x")], &ProgressBar::hidden()).await.unwrap();
        assert_eq!(api.calls().len(), 3);
        assert_eq!(report.batches_failed, 1);
        // two rejections penalize, the broken response does not
        assert_eq!(report.final_pause, Duration::from_secs(140));
        assert!(store.submissions().read().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn success_is_logged_and_rotates_email() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path());
        let api = ScriptedApi::new(vec![
            Reply::Task("t1"),
            Reply::Status(500),
            Reply::Task("t2"),
            Reply::Task("t3"),
        ]);
        let runner = SubmissionLoop::new(&api, &store, emails(), "csv", 5, PacingPolicy::default());

        let report = runner
            .run(vec![batch("x"), batch("y"), batch("z")], &ProgressBar::hidden())
            .await
            .unwrap();
        assert_eq!(report.task_ids, vec!["t1", "t2", "t3"]);
        assert_eq!(report.units_submitted, 3);
        // the retry of "y" keeps its email, rotation advances only on success
        assert_eq!(
            api.calls(),
            vec!["a@example.org", "b@example.org", "b@example.org", "a@example.org"]
        );
        // 120 - 20 (t1) + 10 (500) + 0 (t2, second attempt) - 20 (t3)
        assert_eq!(report.final_pause, Duration::from_secs(90));

        let rows = store.submissions().read().await.unwrap();
        let tasks: Vec<_> = rows.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(tasks, vec!["t1", "t2", "t3"]);
        assert_eq!(store.payloads().entries().await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_responses_show_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path());
        let api = ScriptedApi::new(vec![Reply::Task("t1"), Reply::Broken, Reply::Broken]);
        let runner = SubmissionLoop::new(&api, &store, emails(), "csv", 2, PacingPolicy::default());
        let progress = ProgressBar::hidden();

        let report = runner.run(vec![batch("x"), batch("y")], &progress).await.unwrap();
        assert_eq!(report.batches_failed, 1);
        assert_eq!(
            progress.message(),
            "Error: Response of scripted carries no task id (2/2). Last successful task: t1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_after_every_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::new(dir.path());
        let api = ScriptedApi::new(vec![Reply::Status(500), Reply::Task("t1")]);
        let runner = SubmissionLoop::new(&api, &store, emails(), "csv", 5, PacingPolicy::default());

        let start = tokio::time::Instant::now();
        runner.run(vec![batch("x")], &ProgressBar::hidden()).await.unwrap();
        // 130 after the rejection, then 130 again after the late success
        assert_eq!(start.elapsed(), Duration::from_secs(260));
    }
}
