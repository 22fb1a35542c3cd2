//! Recency-weighted hotspots.
//!
//! Churn decays hyperbolically with the age of a file's last change: a file
//! last touched one half-life ago keeps half its weight, two half-lives ago a
//! third, and so on.

use chrono::DateTime;
use serde::Serialize;
use strata_core::{DateRange, StrataError};

use crate::index::ChangeIndex;

const SECONDS_PER_DAY: i64 = 86_400;

/// A hotspot weighted by how recently the file changed.
///
/// # Examples
///
/// ```
/// use strata_engine::temporal::TemporalHotspot;
///
/// let t = TemporalHotspot {
///     path: "src/lib.rs".into(),
///     lines_changed: 100,
///     additions: 60,
///     deletions: 40,
///     commits: 4,
///     last_changed: "2025-03-01".into(),
///     days_since: 30,
///     score: 50.0,
/// };
/// assert!(t.score <= t.lines_changed as f64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalHotspot {
    /// Logical file path relative to repo root.
    pub path: String,
    /// `additions + deletions`.
    pub lines_changed: u64,
    /// Lines added in the window.
    pub additions: u64,
    /// Lines deleted in the window.
    pub deletions: u64,
    /// Commits touching the file in the window.
    pub commits: u32,
    /// UTC date of the most recent change, `YYYY-MM-DD`.
    pub last_changed: String,
    /// Whole days between the last change and the end of the window.
    pub days_since: u64,
    /// `lines_changed / (1 + days_since / half_life)`.
    pub score: f64,
}

/// Score every indexed file by decayed churn, measured from the window's
/// exclusive end.
///
/// Sorted by score descending, then `commits` descending, then path
/// ascending.
///
/// # Errors
///
/// Returns [`StrataError::Config`] if `half_life_days` is not a positive
/// finite number.
///
/// # Examples
///
/// ```
/// use strata_core::DateRange;
/// use strata_engine::index::ChangeIndex;
/// use strata_engine::temporal::score_temporal_hotspots;
///
/// let range = DateRange::parse("2025-01-01", "2025-02-01").unwrap();
/// let scored = score_temporal_hotspots(&ChangeIndex::default(), &range, 30.0).unwrap();
/// assert!(scored.is_empty());
/// assert!(score_temporal_hotspots(&ChangeIndex::default(), &range, 0.0).is_err());
/// ```
pub fn score_temporal_hotspots(
    index: &ChangeIndex,
    range: &DateRange,
    half_life_days: f64,
) -> Result<Vec<TemporalHotspot>, StrataError> {
    if !half_life_days.is_finite() || half_life_days <= 0.0 {
        return Err(StrataError::Config(format!(
            "half-life must be a positive number of days, got {half_life_days}"
        )));
    }

    let now = range.end_timestamp();
    let mut scored: Vec<TemporalHotspot> = index
        .files()
        .iter()
        .map(|file| {
            let days_since = ((now - file.last_changed).max(0) / SECONDS_PER_DAY) as u64;
            let lines_changed = file.lines_changed();
            let score = lines_changed as f64 / (1.0 + days_since as f64 / half_life_days);
            TemporalHotspot {
                path: file.path.clone(),
                lines_changed,
                additions: file.additions,
                deletions: file.deletions,
                commits: file.commits,
                last_changed: format_day(file.last_changed),
                days_since,
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.commits.cmp(&a.commits))
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(scored)
}

fn format_day(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
