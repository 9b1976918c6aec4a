use crate::packing::batch_size;
use crate::types::work_unit::WorkUnit;
use chrono::NaiveDate;

/// Work units submitted together as one API call.
///
/// Batches produced by the packer share timeline section, aggregation period
/// and variable, and never contain two stations with the same normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    units: Vec<WorkUnit>,
}

impl Batch {
    pub fn new(units: Vec<WorkUnit>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    pub fn into_units(self) -> Vec<WorkUnit> {
        self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Earliest `from` among the members.
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.units.iter().map(|u| u.from).min()
    }

    /// Latest `to` among the members.
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.units.iter().map(|u| u.to).max()
    }

    /// The variable shared by the batch (the first member's).
    pub fn variable(&self) -> Option<&str> {
        self.units.first().map(|u| u.variable.as_str())
    }

    pub fn station_ids(&self) -> Vec<String> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    pub fn station_names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name.clone()).collect()
    }

    /// Recomputed size of the whole batch, see [`batch_size`].
    pub fn total_size(&self) -> i64 {
        batch_size(&self.units)
    }
}
