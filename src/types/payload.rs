//! The request sent to the data API and the record kept of it.

use crate::types::batch::Batch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Datetime format used by the data API and the payload log.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Query parameters of one data request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub email: String,
    pub begin_datetime: String,
    pub end_datetime: String,
    pub variable: String,
    pub station: Vec<String>,
    pub fmt: String,
}

/// A payload as stored in the payload log, keyed by task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRecord {
    #[serde(flatten)]
    pub payload: RequestPayload,
    pub request_time: String,
}

impl RequestPayload {
    /// Builds the payload for `batch`: the window starts one hour before the
    /// earliest day and ends at midnight after the latest day.
    ///
    /// Returns `None` for an empty batch.
    pub fn for_batch(batch: &Batch, email: &str, fmt: &str) -> Option<Self> {
        let first = batch.first_day()?;
        let last = batch.last_day()?;
        let begin = midnight(first) - TimeDelta::hours(1);
        let end = midnight(last + TimeDelta::days(1));
        Some(Self {
            email: email.to_string(),
            begin_datetime: begin.format(DATETIME_FORMAT).to_string(),
            end_datetime: end.format(DATETIME_FORMAT).to_string(),
            variable: batch.variable()?.to_string(),
            station: batch.station_ids(),
            fmt: fmt.to_string(),
        })
    }

    /// Query pairs in the order the API expects; `station` is repeated.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("email", self.email.clone()),
            ("begin_datetime", self.begin_datetime.clone()),
            ("end_datetime", self.end_datetime.clone()),
            ("variable", self.variable.clone()),
        ];
        pairs.extend(self.station.iter().map(|s| ("station", s.clone())));
        pairs.push(("fmt", self.fmt.clone()));
        pairs
    }

    pub fn record_at(self, when: DateTime<Utc>) -> PayloadRecord {
        PayloadRecord {
            payload: self,
            request_time: when.format(DATETIME_FORMAT).to_string(),
        }
    }
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}
