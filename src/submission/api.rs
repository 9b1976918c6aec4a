use crate::submission::error::SubmitError;
use crate::types::payload::RequestPayload;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://simc.arpae.it/meteozen/debra/api/data";

/// How long one submission may take before it counts as a failed attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The remote endpoint that accepts data requests.
#[async_trait]
pub trait DataApi: Send + Sync {
    /// Submits one request and returns the task id the service assigned.
    async fn submit(&self, payload: &RequestPayload) -> Result<String, SubmitError>;
}

#[derive(Debug, Clone)]
pub struct HttpDataApi {
    client: Client,
    url: String,
}

impl HttpDataApi {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataApi for HttpDataApi {
    async fn submit(&self, payload: &RequestPayload) -> Result<String, SubmitError> {
        debug!(
            "Requesting {} for {} station(s)",
            payload.variable,
            payload.station.len()
        );
        let response = self
            .client
            .get(&self.url)
            .query(&payload.query_pairs())
            .send()
            .await
            .map_err(|e| SubmitError::NetworkRequest(self.url.clone(), e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmitError::NetworkRequest(self.url.clone(), e))?;

        if status != StatusCode::OK {
            let detail = error_detail(&body);
            warn!("HTTP error for {}: {} {:?}", self.url, status, detail);
            return Err(SubmitError::Rejected { status, detail });
        }

        let json: Value =
            serde_json::from_slice(&body).map_err(|e| SubmitError::Decode(self.url.clone(), e))?;
        task_id(&json).ok_or_else(|| SubmitError::MissingTask(self.url.clone()))
    }
}

fn task_id(json: &Value) -> Option<String> {
    match json.get("task")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Human-readable reason from an error body: `detail`, else `details`.
fn error_detail(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;
    let detail = json.get("detail").or_else(|| json.get("details"))?;
    Some(match detail {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
