use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("CSV error in '{path}'")]
    Csv {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Required column '{column}' not found in '{path}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Malformed row {row} in '{path}': {message}")]
    InvalidRow {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("Failed to parse JSON document '{0}'")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("Failed to replace '{0}'")]
    Persist(PathBuf, #[source] tempfile::PersistError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
