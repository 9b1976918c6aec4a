use chrono::{NaiveDate, TimeDelta};

/// Fifteen years, the longest range a single request is trusted with.
pub const DEFAULT_MAX_DAYS: i64 = 15 * 365;

/// A bounded slice of the overall requested time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSection {
    pub index: i32,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl TimelineSection {
    /// Whether an availability window `[begin, end]` touches this section.
    /// Both ends are inclusive.
    pub fn overlaps(&self, begin: NaiveDate, end: NaiveDate) -> bool {
        begin <= self.to && end >= self.from
    }
}

/// Cuts `[start, end]` into consecutive sections of at most `max_days` days.
///
/// Cut points are `start, start + max_days, ...` up to `end`, followed by
/// `end` itself; consecutive cuts with `from < to` become a section. Adjacent
/// sections share their boundary day.
pub fn timeline_sections(start: NaiveDate, end: NaiveDate, max_days: i64) -> Vec<TimelineSection> {
    if max_days <= 0 || end < start {
        return Vec::new();
    }
    let step = TimeDelta::days(max_days);
    let mut cuts = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        cuts.push(cursor);
        cursor = match cursor.checked_add_signed(step) {
            Some(next) => next,
            None => break,
        };
    }
    cuts.push(end);

    cuts.windows(2)
        .filter(|pair| pair[0] < pair[1])
        .enumerate()
        .map(|(index, pair)| TimelineSection {
            index: index as i32,
            from: pair[0],
            to: pair[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn single_section_when_range_is_short() {
        let sections = timeline_sections(d(2000, 1, 1), d(2000, 12, 31), DEFAULT_MAX_DAYS);
        assert_eq!(
            sections,
            vec![TimelineSection {
                index: 0,
                from: d(2000, 1, 1),
                to: d(2000, 12, 31)
            }]
        );
    }

    #[test]
    fn sections_share_boundaries_and_cover_range() {
        let sections = timeline_sections(d(2000, 1, 1), d(2000, 1, 25), 10);
        let bounds: Vec<_> = sections.iter().map(|s| (s.index, s.from, s.to)).collect();
        assert_eq!(
            bounds,
            vec![
                (0, d(2000, 1, 1), d(2000, 1, 11)),
                (1, d(2000, 1, 11), d(2000, 1, 21)),
                (2, d(2000, 1, 21), d(2000, 1, 25)),
            ]
        );
    }

    #[test]
    fn end_on_a_cut_does_not_create_an_empty_section() {
        let sections = timeline_sections(d(2000, 1, 1), d(2000, 1, 21), 10);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].to, d(2000, 1, 21));
    }

    #[test]
    fn degenerate_ranges_have_no_sections() {
        assert!(timeline_sections(d(2000, 1, 2), d(2000, 1, 1), 10).is_empty());
        assert!(timeline_sections(d(2000, 1, 1), d(2000, 1, 1), 10).is_empty());
        assert!(timeline_sections(d(2000, 1, 1), d(2000, 2, 1), 0).is_empty());
    }

    #[test]
    fn overlap_is_inclusive() {
        let section = TimelineSection {
            index: 0,
            from: d(2000, 1, 1),
            to: d(2000, 1, 10),
        };
        assert!(section.overlaps(d(2000, 1, 10), d(2000, 2, 1)));
        assert!(section.overlaps(d(1999, 1, 1), d(2000, 1, 1)));
        assert!(!section.overlaps(d(2000, 1, 11), d(2000, 2, 1)));
    }
}
