//! Expansion of the catalog into work units.

use crate::backlog::sections::{timeline_sections, TimelineSection};
use crate::types::catalog::CatalogEntry;
use crate::types::work_unit::{point_count, WorkUnit};
use chrono::NaiveDate;
use log::debug;
use std::cmp::Reverse;

/// What to download: which series, over which range, cut how finely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogRequest {
    /// Bare variable codes (e.g. `B13011`).
    pub variables: Vec<String>,
    pub agg_codes: Vec<i32>,
    /// Aggregation span in seconds: 86400, 3600 or 900 on Dext3r.
    pub agg_span: i64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub max_days: i64,
}

impl BacklogRequest {
    fn wants(&self, entry: &CatalogEntry) -> bool {
        entry.agg_period == self.agg_span
            && self.variables.iter().any(|v| *v == entry.variable_code)
            && self.agg_codes.contains(&entry.agg_code)
    }
}

/// Crosses the requested series with the timeline sections, clipping each
/// unit to the overlap of series availability and section bounds.
///
/// Series whose availability ends before it begins are skipped. Units come
/// out in catalog order, then section order.
pub fn build_backlog(catalog: &[CatalogEntry], request: &BacklogRequest) -> Vec<WorkUnit> {
    let sections = timeline_sections(request.from_date, request.to_date, request.max_days);
    catalog
        .iter()
        .filter(|entry| {
            let ordered = entry.begin <= entry.end;
            if !ordered {
                debug!(
                    "Skipping series {} of station {}: begins {} after it ends {}",
                    entry.variable, entry.station_id, entry.begin, entry.end
                );
            }
            ordered
        })
        .filter(|entry| entry.end >= request.from_date && entry.begin <= request.to_date)
        .filter(|entry| request.wants(entry))
        .flat_map(|entry| {
            sections
                .iter()
                .filter(|section| section.overlaps(entry.begin, entry.end))
                .map(move |section| clip(entry, section))
        })
        .collect()
}

fn clip(entry: &CatalogEntry, section: &TimelineSection) -> WorkUnit {
    let from = entry.begin.max(section.from);
    let to = entry.end.min(section.to);
    WorkUnit {
        name: entry.name.clone(),
        id: entry.station_id.clone(),
        variable: entry.variable.clone(),
        agg_code: entry.agg_code,
        agg_period: entry.agg_period,
        from,
        to,
        count: point_count(from, to, entry.agg_period),
        timeline_section: section.index,
    }
}

/// Orders the queue heaviest first: by `count`, then `timeline_section`, both
/// descending. The sort is stable.
pub fn sort_queue(units: &mut [WorkUnit]) {
    units.sort_by_key(|u| (Reverse(u.count), Reverse(u.timeline_section)));
}
