use reqwest::StatusCode;
use thiserror::Error;

/// Failure of one submission attempt. These never abort a run; the loop
/// decides whether to retry.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Network request to {0} failed")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("Request rejected with status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Could not decode the response of {0}")]
    Decode(String, #[source] serde_json::Error),

    #[error("Response of {0} carries no task id")]
    MissingTask(String),
}

impl SubmitError {
    /// A forbidden status means this client is blocked; retrying is pointless.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmitError::Rejected { status, .. } if *status == StatusCode::FORBIDDEN)
    }
}
