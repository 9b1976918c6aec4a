//! The atomic unit of requestable demand and the key used to recognise it
//! across runs.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// One station / series / timeline-section slice of data to request.
///
/// Created by the backlog builder and never mutated afterwards; the packer
/// moves units out of the backlog into batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub name: String,
    pub id: String,
    /// Full series code, also the `variable` sent to the data API.
    pub variable: String,
    pub agg_code: i32,
    /// Aggregation period in seconds.
    pub agg_period: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Estimated number of points, used only for sizing batches.
    pub count: i64,
    pub timeline_section: i32,
}

/// Identity of a work unit for resume purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResumeKey {
    pub id: String,
    pub variable: String,
    pub timeline_section: i32,
}

impl WorkUnit {
    pub fn resume_key(&self) -> ResumeKey {
        ResumeKey {
            id: self.id.clone(),
            variable: self.variable.clone(),
            timeline_section: self.timeline_section,
        }
    }

    /// Station name as compared when checking for duplicates in a batch.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Number of points of period `agg_period` seconds in the inclusive day range
/// `[from, to]`. Returns 0 for inverted ranges or a non-positive period.
pub fn point_count(from: NaiveDate, to: NaiveDate, agg_period: i64) -> i64 {
    if agg_period <= 0 || to < from {
        return 0;
    }
    let span = to - from + TimeDelta::days(1);
    span.num_seconds() / agg_period
}
