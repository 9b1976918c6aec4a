//! Greedy first-fit grouping of the sorted backlog into API-sized batches.
//!
//! The policy is deliberately simple and must stay stable: historical
//! submission logs were produced by it. A batch is seeded with the first unit
//! that fits on its own, then grown with the first compatible unit that keeps
//! the recomputed batch size within the ceiling, until nothing else fits.

use crate::types::batch::Batch;
use crate::types::work_unit::{normalize_name, WorkUnit};
use chrono::{NaiveDate, TimeDelta};
use std::collections::HashSet;

/// Size of a set of units as the service sees it: every station is asked for
/// the whole shared window, so the size is
/// `(max(to) - min(from) + 1 day) * n / min(agg_period)`.
pub fn batch_size(units: &[WorkUnit]) -> i64 {
    let mut extent: Option<Extent> = None;
    for unit in units {
        extent = Some(match extent {
            None => Extent::of(unit),
            Some(e) => e.with(unit),
        });
    }
    extent.map_or(0, |e| e.size())
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    from: NaiveDate,
    to: NaiveDate,
    agg_period: i64,
    units: i64,
}

impl Extent {
    fn of(unit: &WorkUnit) -> Self {
        Self {
            from: unit.from,
            to: unit.to,
            agg_period: unit.agg_period,
            units: 1,
        }
    }

    fn with(self, unit: &WorkUnit) -> Self {
        Self {
            from: self.from.min(unit.from),
            to: self.to.max(unit.to),
            agg_period: self.agg_period.min(unit.agg_period),
            units: self.units + 1,
        }
    }

    fn size(&self) -> i64 {
        if self.agg_period <= 0 {
            return 0;
        }
        let span = self.to - self.from + TimeDelta::days(1);
        span.num_seconds() * self.units / self.agg_period
    }
}

/// Batch under construction.
struct PartialBatch {
    units: Vec<WorkUnit>,
    names: HashSet<String>,
    extent: Extent,
}

impl PartialBatch {
    fn seed(unit: WorkUnit) -> Self {
        let extent = Extent::of(&unit);
        let names = HashSet::from([unit.normalized_name()]);
        Self {
            units: vec![unit],
            names,
            extent,
        }
    }

    fn accepts(&self, candidate: &WorkUnit, max_size: i64) -> bool {
        let head = &self.units[0];
        candidate.timeline_section == head.timeline_section
            && candidate.agg_period == head.agg_period
            && candidate.variable == head.variable
            && !self.names.contains(&normalize_name(&candidate.name))
            && self.extent.with(candidate).size() <= max_size
    }

    fn push(&mut self, unit: WorkUnit) {
        self.extent = self.extent.with(&unit);
        self.names.insert(unit.normalized_name());
        self.units.push(unit);
    }
}

/// Removes and returns the next batch from a queue sorted by
/// [`crate::backlog::builder::sort_queue`].
///
/// The seed is the first unit whose own `count` fits `max_size`. When no unit
/// fits, the first remaining one is returned alone: oversized single-station
/// ranges are sent as they are. Returns `None` once the queue is empty.
pub fn pop_batch(queue: &mut Vec<WorkUnit>, max_size: i64) -> Option<Batch> {
    if queue.is_empty() {
        return None;
    }
    let seed = queue
        .iter()
        .position(|unit| unit.count <= max_size)
        .unwrap_or(0);
    let mut batch = PartialBatch::seed(queue.remove(seed));

    while let Some(next) = queue
        .iter()
        .position(|candidate| batch.accepts(candidate, max_size))
    {
        batch.push(queue.remove(next));
    }
    Some(Batch::new(batch.units))
}

/// Iterator draining a sorted queue batch by batch.
///
/// Each batch is only built when requested, so packing interleaves with
/// whatever consumes the batches.
#[derive(Debug, Clone)]
pub struct BatchPacker {
    queue: Vec<WorkUnit>,
    max_size: i64,
}

impl BatchPacker {
    pub fn new(queue: Vec<WorkUnit>, max_size: i64) -> Self {
        Self { queue, max_size }
    }

    /// Units not yet handed out.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Iterator for BatchPacker {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        pop_batch(&mut self.queue, self.max_size)
    }
}

/// Packs the whole queue at once.
pub fn pack_all(queue: Vec<WorkUnit>, max_size: i64) -> Vec<Batch> {
    BatchPacker::new(queue, max_size).collect()
}
