//! Entry point tying the catalog, the resume state and the data API together.

use crate::backlog::builder::{build_backlog, sort_queue};
use crate::backlog::resume_filter::remove_satisfied;
use crate::catalog::reader::CatalogReader;
use crate::config::{DownloadConfig, Endpoints};
use crate::error::Dext3rError;
use crate::packing::{pack_all, BatchPacker};
use crate::store::{ResumeStore, StoreSummary};
use crate::submission::api::{DataApi, HttpDataApi};
use crate::submission::submit_loop::{DownloadReport, SubmissionLoop};
use crate::types::batch::Batch;
use crate::types::catalog::CatalogEntry;
use crate::types::work_unit::WorkUnit;
use crate::utils::{ensure_workspace_exists, get_default_workspace};
use bon::bon;
use indicatif::ProgressBar;
use log::info;
use std::path::{Path, PathBuf};

/// Outcome of a dry run: the queue and how it would be packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub units: usize,
    pub batches: Vec<Batch>,
}

impl Plan {
    /// The batch with the largest recomputed size.
    pub fn largest_batch(&self) -> Option<&Batch> {
        self.batches.iter().max_by_key(|b| b.total_size())
    }
}

/// Client for bulk requests against one workspace.
///
/// The workspace holds the catalog cache and the resume state. It must not be
/// shared by two running instances.
pub struct Dext3r {
    workspace: PathBuf,
    catalog: CatalogReader,
    store: ResumeStore,
    api: Box<dyn DataApi>,
}

#[bon]
impl Dext3r {
    /// Opens (and creates if needed) `workspace`, talking to the public
    /// Dext3r endpoints.
    pub async fn with_workspace(workspace: PathBuf) -> Result<Self, Dext3rError> {
        Self::with_endpoints(workspace, &Endpoints::default()).await
    }

    pub async fn with_endpoints(
        workspace: PathBuf,
        endpoints: &Endpoints,
    ) -> Result<Self, Dext3rError> {
        ensure_workspace_exists(&workspace)
            .await
            .map_err(|e| Dext3rError::WorkspaceCreation(workspace.clone(), e))?;
        let api = HttpDataApi::new(&endpoints.api_url).map_err(Dext3rError::HttpClient)?;
        Ok(Self {
            catalog: CatalogReader::with_urls(
                &workspace,
                &endpoints.stations_url,
                &endpoints.series_url,
            ),
            store: ResumeStore::new(&workspace),
            api: Box::new(api),
            workspace,
        })
    }

    /// Uses the default workspace under the user's data directory.
    pub async fn new() -> Result<Self, Dext3rError> {
        let workspace = get_default_workspace().map_err(Dext3rError::WorkspaceResolution)?;
        Self::with_workspace(workspace).await
    }

    /// Replaces the data API, e.g. with a recording or offline one.
    pub fn with_api(mut self, api: Box<dyn DataApi>) -> Self {
        self.api = api;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub async fn catalog(&self, force_refresh: bool) -> Result<Vec<CatalogEntry>, Dext3rError> {
        Ok(self.catalog.load(force_refresh).await?)
    }

    /// Downloads both catalog documents again and rebuilds the cache.
    pub async fn refresh_catalog(&self) -> Result<Vec<CatalogEntry>, Dext3rError> {
        self.catalog(true).await
    }

    /// The work still to be requested, heaviest first.
    ///
    /// With `resume` set, units already covered by a valid task are dropped.
    pub async fn request_queue(
        &self,
        config: &DownloadConfig,
    ) -> Result<Vec<WorkUnit>, Dext3rError> {
        config.validate()?;
        let catalog = self.catalog(config.force_catalog_refresh).await?;
        let mut queue = build_backlog(&catalog, &config.backlog_request());
        let total = queue.len();
        if config.resume {
            let satisfied = self.store.satisfied_keys().await?;
            queue = remove_satisfied(queue, &satisfied);
        }
        sort_queue(&mut queue);
        info!(
            "{} of {} work unit(s) left to request",
            queue.len(),
            total
        );
        Ok(queue)
    }

    /// Builds and packs the queue without submitting anything.
    pub async fn plan(&self, config: &DownloadConfig) -> Result<Plan, Dext3rError> {
        let queue = self.request_queue(config).await?;
        let units = queue.len();
        Ok(Plan {
            units,
            batches: pack_all(queue, config.max_lines),
        })
    }

    /// Packs and submits the queue, one batch at a time.
    ///
    /// Failed batches are left for a later resumed run. Progress goes to
    /// `progress` when given, otherwise to a hidden bar.
    #[builder]
    pub async fn download(
        &self,
        config: &DownloadConfig,
        progress: Option<ProgressBar>,
    ) -> Result<DownloadReport, Dext3rError> {
        let queue = self.request_queue(config).await?;
        let progress = progress.unwrap_or_else(ProgressBar::hidden);
        progress.set_length(queue.len() as u64);

        let runner = SubmissionLoop::new(
            self.api.as_ref(),
            &self.store,
            config.rotation(),
            &config.fmt,
            config.max_tries,
            config.pacing,
        );
        let report = runner
            .run(BatchPacker::new(queue, config.max_lines), &progress)
            .await?;
        progress.finish();
        Ok(report)
    }

    pub async fn status(&self) -> Result<StoreSummary, Dext3rError> {
        Ok(self.store.summary().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::pacing::PacingPolicy;
    use chrono::NaiveDate;
    use mockito::Matcher;
    use std::collections::HashSet;
    use std::time::Duration;

    const STATIONS: &str = r#"[
        {"id": 1, "name": "Alpha"},
        {"id": 2, "name": "alpha "},
        {"id": 3, "name": "Gamma"}
    ]"#;

    const SERIES: &str = r#"[
        {"station": 1, "variable": "3,0,86400/103,2000,-,-/B12101", "begin": "2000-01-01T00:00:00", "end": "2000-12-31T00:00:00"},
        {"station": 2, "variable": "3,0,86400/103,2000,-,-/B12101", "begin": "2000-01-01T00:00:00", "end": "2000-12-31T00:00:00"},
        {"station": 3, "variable": "3,0,86400/103,2000,-,-/B12101", "begin": "2000-06-01T00:00:00", "end": "2000-12-31T00:00:00"},
        {"station": 3, "variable": "3,0,86400/103,2000,-,-/B13011", "begin": "2000-01-01T00:00:00", "end": "2000-12-31T00:00:00"}
    ]"#;

    async fn server() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stations")
            .with_body(STATIONS)
            .create_async()
            .await;
        server
            .mock("GET", "/archivesummary")
            .with_body(SERIES)
            .create_async()
            .await;
        server
    }

    fn endpoints(server: &mockito::ServerGuard) -> Endpoints {
        Endpoints {
            api_url: format!("{}/data", server.url()),
            stations_url: format!("{}/stations", server.url()),
            series_url: format!("{}/archivesummary", server.url()),
        }
    }

    fn config() -> DownloadConfig {
        DownloadConfig::builder()
            .emails(vec!["me@example.org".to_string()])
            .variables(vec!["B12101".to_string()])
            .agg_codes(vec![3])
            .agg_span(86400)
            .from_date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
            .to_date(NaiveDate::from_ymd_opt(2000, 12, 31).unwrap())
            .max_lines(1000)
            .pacing(PacingPolicy {
                pause: Duration::ZERO,
                min_pause: Duration::ZERO,
                ..PacingPolicy::default()
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn plan_keeps_same_named_stations_apart() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let client = Dext3r::with_endpoints(dir.path().to_path_buf(), &endpoints(&server))
            .await
            .unwrap();

        let plan = client.plan(&config()).await.unwrap();
        assert_eq!(plan.units, 3);
        assert_eq!(plan.batches.len(), 2);
        for batch in &plan.batches {
            let names: HashSet<_> = batch.units().iter().map(|u| u.normalized_name()).collect();
            assert_eq!(names.len(), batch.len());
        }
        assert!(plan.largest_batch().unwrap().total_size() <= 1000);
    }

    #[tokio::test]
    async fn resumed_run_skips_submitted_work() {
        let mut server = server().await;
        let api = server
            .mock("GET", "/data")
            .match_query(Matcher::Any)
            .with_body(r#"{"task": "0f8fad5b-d9cb-469f-a165-70867728950e"}"#)
            .expect(2)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let client = Dext3r::with_endpoints(dir.path().to_path_buf(), &endpoints(&server))
            .await
            .unwrap();

        let report = client.download().config(&config()).call().await.unwrap();
        assert_eq!(report.batches_submitted, 2);
        assert_eq!(report.units_submitted, 3);
        api.assert_async().await;

        assert!(client.request_queue(&config()).await.unwrap().is_empty());
        let status = client.status().await.unwrap();
        assert_eq!(status.logged_units, 3);
        assert_eq!(status.satisfied_units, 3);

        std::fs::write(
            dir.path().join("invalid_tasks.txt"),
            "0f8fad5b-d9cb-469f-a165-70867728950e failed",
        )
        .unwrap();
        assert_eq!(client.request_queue(&config()).await.unwrap().len(), 3);
    }
}
