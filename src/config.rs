//! Run parameters and the remote endpoints they apply to.

use crate::backlog::builder::BacklogRequest;
use crate::backlog::sections::DEFAULT_MAX_DAYS;
use crate::catalog::reader::{DEFAULT_SERIES_URL, DEFAULT_STATIONS_URL};
use crate::submission::api::DEFAULT_API_URL;
use crate::submission::pacing::PacingPolicy;
use bon::bon;
use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_LINES: i64 = 18_000;
pub const DEFAULT_MAX_TRIES: u32 = 5;
pub const DEFAULT_FORMAT: &str = "csv";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one email address is required")]
    NoEmails,

    #[error("At least one variable is required")]
    NoVariables,

    #[error("At least one aggregation code is required")]
    NoAggregationCodes,

    #[error("Aggregation span must be positive, got {0}")]
    InvalidAggregationSpan(i64),

    #[error("max_tries must be at least 1")]
    InvalidMaxTries,

    #[error("max_days must be at least 1, got {0}")]
    InvalidMaxDays(i64),

    #[error("max_lines must be at least 1, got {0}")]
    InvalidMaxLines(i64),

    #[error("Start date {from} is after end date {to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },

    #[error("Pause of {pause:?} is outside [{min:?}, {max:?}]")]
    InvalidPacing {
        pause: Duration,
        min: Duration,
        max: Duration,
    },
}

/// URLs of the three services the downloader talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_url: String,
    pub stations_url: String,
    pub series_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            stations_url: DEFAULT_STATIONS_URL.to_string(),
            series_url: DEFAULT_SERIES_URL.to_string(),
        }
    }
}

/// A validated download run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub emails: Vec<String>,
    pub variables: Vec<String>,
    pub agg_codes: Vec<i32>,
    pub agg_span: i64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub max_days: i64,
    pub max_lines: i64,
    pub max_tries: u32,
    pub resume: bool,
    pub force_catalog_refresh: bool,
    pub fmt: String,
    pub pacing: PacingPolicy,
}

#[bon]
impl DownloadConfig {
    /// Builds and validates a run configuration.
    ///
    /// Unset options take their defaults: `max_days` 15 years, `max_lines`
    /// 18 000, `max_tries` 5, `resume` on, no forced catalog refresh, `csv`
    /// output and [`PacingPolicy::default`].
    #[builder]
    pub fn new(
        emails: Vec<String>,
        variables: Vec<String>,
        agg_codes: Vec<i32>,
        agg_span: i64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        max_days: Option<i64>,
        max_lines: Option<i64>,
        max_tries: Option<u32>,
        resume: Option<bool>,
        force_catalog_refresh: Option<bool>,
        fmt: Option<String>,
        pacing: Option<PacingPolicy>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            emails,
            variables,
            agg_codes,
            agg_span,
            from_date,
            to_date,
            max_days: max_days.unwrap_or(DEFAULT_MAX_DAYS),
            max_lines: max_lines.unwrap_or(DEFAULT_MAX_LINES),
            max_tries: max_tries.unwrap_or(DEFAULT_MAX_TRIES),
            resume: resume.unwrap_or(true),
            force_catalog_refresh: force_catalog_refresh.unwrap_or(false),
            fmt: fmt.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            pacing: pacing.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.emails.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::NoEmails);
        }
        if self.variables.is_empty() {
            return Err(ConfigError::NoVariables);
        }
        if self.agg_codes.is_empty() {
            return Err(ConfigError::NoAggregationCodes);
        }
        if self.agg_span <= 0 {
            return Err(ConfigError::InvalidAggregationSpan(self.agg_span));
        }
        if self.max_tries == 0 {
            return Err(ConfigError::InvalidMaxTries);
        }
        if self.max_days < 1 {
            return Err(ConfigError::InvalidMaxDays(self.max_days));
        }
        if self.max_lines < 1 {
            return Err(ConfigError::InvalidMaxLines(self.max_lines));
        }
        if self.from_date > self.to_date {
            return Err(ConfigError::InvertedRange {
                from: self.from_date,
                to: self.to_date,
            });
        }
        let p = &self.pacing;
        if p.min_pause > p.max_pause || p.pause < p.min_pause || p.pause > p.max_pause {
            return Err(ConfigError::InvalidPacing {
                pause: p.pause,
                min: p.min_pause,
                max: p.max_pause,
            });
        }
        Ok(())
    }

    pub fn backlog_request(&self) -> BacklogRequest {
        BacklogRequest {
            variables: self.variables.clone(),
            agg_codes: self.agg_codes.clone(),
            agg_span: self.agg_span,
            from_date: self.from_date,
            to_date: self.to_date,
            max_days: self.max_days,
        }
    }

    /// Email addresses with blanks removed, in rotation order.
    pub fn rotation(&self) -> Vec<String> {
        self.emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }
}
