mod backlog;
mod catalog;
mod config;
mod dext3r;
mod error;
mod packing;
mod store;
mod submission;
mod types;
mod utils;

pub use dext3r::*;
pub use error::Dext3rError;
pub use utils::get_default_workspace;

pub use config::{ConfigError, DownloadConfig, Endpoints};
pub use config::{DEFAULT_FORMAT, DEFAULT_MAX_LINES, DEFAULT_MAX_TRIES};

pub use backlog::builder::{build_backlog, sort_queue, BacklogRequest};
pub use backlog::resume_filter::{remove_satisfied, satisfied_keys};
pub use backlog::sections::{timeline_sections, TimelineSection, DEFAULT_MAX_DAYS};
pub use catalog::reader::{join_catalog, CatalogReader, DEFAULT_SERIES_URL, DEFAULT_STATIONS_URL};
pub use packing::{batch_size, pack_all, pop_batch, BatchPacker};
pub use store::invalid_tasks::{extract_invalid_task_ids, load_invalid_tasks};
pub use store::payload_log::PayloadLog;
pub use store::submission_log::{SubmissionLog, SubmissionRow};
pub use store::{ResumeStore, StoreSummary};
pub use submission::api::{DataApi, HttpDataApi, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};
pub use submission::pacing::{Pacer, PacingPolicy};
pub use submission::submit_loop::{BatchOutcome, DownloadReport, SubmissionLoop};

pub use types::batch::Batch;
pub use types::catalog::{CatalogEntry, SeriesCode, SeriesCodeParseError, SeriesInfo, Station};
pub use types::payload::{PayloadRecord, RequestPayload, DATETIME_FORMAT};
pub use types::work_unit::{normalize_name, point_count, ResumeKey, WorkUnit};

pub use catalog::error::CatalogError;
pub use store::error::StoreError;
pub use submission::error::SubmitError;
