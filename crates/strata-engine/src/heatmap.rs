//! Commit-activity heatmaps by calendar day and by hour of day (UTC).
//!
//! Both maps are dense and count every commit in the window, including
//! commits whose files were all excluded.

use chrono::{DateTime, Timelike};
use serde::Serialize;
use strata_core::DateRange;

use crate::index::{ChangeIndex, IndexedCommit};

const SECONDS_PER_DAY: i64 = 86_400;

/// Commits on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapDay {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Commits authored that day.
    pub count: u32,
}

/// Commits in one UTC hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    /// 0 through 23.
    pub hour: u32,
    /// Commits authored in that hour on any day.
    pub count: u32,
}

fn by_author<'a>(
    index: &'a ChangeIndex,
    author: Option<&'a str>,
) -> impl Iterator<Item = &'a IndexedCommit> + 'a {
    index
        .commits()
        .iter()
        .filter(move |c| author.map_or(true, |email| c.email == email))
}

/// One entry per day in `range`, oldest first.
///
/// With `author` set, only that email's commits count.
///
/// # Examples
///
/// ```
/// use strata_core::DateRange;
/// use strata_engine::heatmap::commit_heatmap;
/// use strata_engine::index::ChangeIndex;
///
/// let range = DateRange::parse("2025-01-01", "2025-01-08").unwrap();
/// let days = commit_heatmap(&ChangeIndex::default(), &range, None);
/// assert_eq!(days.len(), 7);
/// assert_eq!(days[0].date, "2025-01-01");
/// assert!(days.iter().all(|d| d.count == 0));
/// ```
pub fn commit_heatmap(
    index: &ChangeIndex,
    range: &DateRange,
    author: Option<&str>,
) -> Vec<HeatmapDay> {
    let start = range.start_timestamp();
    let mut counts = vec![0u32; range.day_count()];

    for commit in by_author(index, author) {
        if !range.contains(commit.timestamp) {
            continue;
        }
        let slot = ((commit.timestamp - start) / SECONDS_PER_DAY) as usize;
        if let Some(count) = counts.get_mut(slot) {
            *count += 1;
        }
    }

    range
        .days()
        .zip(counts)
        .map(|(day, count)| HeatmapDay {
            date: day.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect()
}

/// Exactly 24 buckets, hour 0 first.
///
/// With `author` set, only that email's commits count.
///
/// # Examples
///
/// ```
/// use strata_engine::heatmap::commits_by_hour;
/// use strata_engine::index::ChangeIndex;
///
/// let hours = commits_by_hour(&ChangeIndex::default(), None);
/// assert_eq!(hours.len(), 24);
/// assert_eq!(hours[23].hour, 23);
/// ```
pub fn commits_by_hour(index: &ChangeIndex, author: Option<&str>) -> Vec<HourBucket> {
    let mut buckets: Vec<HourBucket> = (0..24).map(|hour| HourBucket { hour, count: 0 }).collect();

    for commit in by_author(index, author) {
        if let Some(dt) = DateTime::from_timestamp(commit.timestamp, 0) {
            buckets[dt.hour() as usize].count += 1;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclude::ExcludeSet;
    use crate::testing::{change, make_commit};

    fn day(date: &str) -> i64 {
        DateRange::parse(date, date).unwrap().start_timestamp()
    }

    fn index() -> ChangeIndex {
        let exclude = ExcludeSet::new(&["*.lock".to_string()]).unwrap();
        ChangeIndex::build(
            vec![
                make_commit("c1", "alice", day("2025-01-01") + 9 * 3600, vec![change("a.rs", 1, 0)]),
                make_commit("c2", "alice", day("2025-01-01") + 14 * 3600, vec![change("a.rs", 1, 0)]),
                make_commit("c3", "bob", day("2025-01-03") + 9 * 3600 + 59, vec![change("Cargo.lock", 1, 0)]),
                make_commit("c4", "bob", day("2025-01-05") + 23 * 3600, vec![change("b.rs", 1, 0)]),
            ],
            &exclude,
        )
    }

    #[test]
    fn heatmap_is_dense_and_sums_to_commit_count() {
        let range = DateRange::parse("2025-01-01", "2025-01-06").unwrap();
        let days = commit_heatmap(&index(), &range, None);

        assert_eq!(days.len(), 5);
        let counts: Vec<u32> = days.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![2, 0, 1, 0, 1]);
        assert_eq!(days[2].date, "2025-01-03");
        assert_eq!(counts.iter().sum::<u32>(), 4);
    }

    #[test]
    fn heatmap_ignores_commits_outside_range() {
        let range = DateRange::parse("2025-01-02", "2025-01-04").unwrap();
        let days = commit_heatmap(&index(), &range, None);
        assert_eq!(days.len(), 2);
        assert_eq!(days.iter().map(|d| d.count).sum::<u32>(), 1);
    }

    #[test]
    fn empty_range_has_no_days() {
        let range = DateRange::parse("2025-01-01", "2025-01-01").unwrap();
        assert!(commit_heatmap(&index(), &range, None).is_empty());
    }

    #[test]
    fn author_filter_limits_counts() {
        let range = DateRange::parse("2025-01-01", "2025-01-06").unwrap();
        let days = commit_heatmap(&index(), &range, Some("bob@example.com"));
        assert_eq!(days.len(), 5);
        assert_eq!(days.iter().map(|d| d.count).sum::<u32>(), 2);
        assert_eq!(days[0].count, 0);
    }

    #[test]
    fn hours_are_dense_and_bucketed_in_utc() {
        let hours = commits_by_hour(&index(), None);
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[9].count, 2);
        assert_eq!(hours[14].count, 1);
        assert_eq!(hours[23].count, 1);
        assert_eq!(hours.iter().map(|h| h.count).sum::<u32>(), 4);
    }

    #[test]
    fn hours_respect_author_filter() {
        let hours = commits_by_hour(&index(), Some("alice@example.com"));
        assert_eq!(hours.iter().map(|h| h.count).sum::<u32>(), 2);
        assert_eq!(hours[23].count, 0);
    }
}
