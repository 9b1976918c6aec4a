use crate::store::submission_log::SubmissionRow;
use crate::types::work_unit::{ResumeKey, WorkUnit};
use std::collections::{BTreeSet, HashSet};

/// Keys of work already covered by an accepted submission whose task has not
/// been flagged invalid. `invalid_tasks` holds lowercase ids.
pub fn satisfied_keys(rows: &[SubmissionRow], invalid_tasks: &BTreeSet<String>) -> HashSet<ResumeKey> {
    rows.iter()
        .filter(|row| !invalid_tasks.contains(&row.task_id.to_ascii_lowercase()))
        .map(SubmissionRow::resume_key)
        .collect()
}

/// Drops the units whose `(id, variable, timeline_section)` is satisfied.
pub fn remove_satisfied(units: Vec<WorkUnit>, satisfied: &HashSet<ResumeKey>) -> Vec<WorkUnit> {
    if satisfied.is_empty() {
        return units;
    }
    units
        .into_iter()
        .filter(|unit| !satisfied.contains(&unit.resume_key()))
        .collect()
}
