//! Churn hotspot ranking.
//!
//! A hotspot is simply a file with a lot of changed lines in the window.
//! Ranking is by raw churn; see [`crate::temporal`] for the recency-weighted
//! variant.

use serde::Serialize;

use crate::index::ChangeIndex;

/// One file ranked by churn.
///
/// # Examples
///
/// ```
/// use strata_engine::hotspots::FileHotspot;
///
/// let h = FileHotspot {
///     path: "src/main.rs".into(),
///     lines_changed: 500,
///     additions: 320,
///     deletions: 180,
///     commits: 12,
/// };
/// assert_eq!(h.lines_changed, h.additions + h.deletions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHotspot {
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
}

/// Rank every indexed file by churn.
///
/// Sorted by `lines_changed` descending, then `commits` descending, then
/// path ascending.
///
/// # Examples
///
/// ```
/// use strata_engine::hotspots::rank_hotspots;
/// use strata_engine::index::ChangeIndex;
///
/// assert!(rank_hotspots(&ChangeIndex::default()).is_empty());
/// ```
pub fn rank_hotspots(index: &ChangeIndex) -> Vec<FileHotspot> {
    let mut hotspots: Vec<FileHotspot> = index
        .files()
        .iter()
        .map(|file| FileHotspot {
            path: file.path.clone(),
            lines_changed: file.lines_changed(),
            additions: file.additions,
            deletions: file.deletions,
            commits: file.commits,
        })
        .collect();

    hotspots.sort_by(|a, b| {
        b.lines_changed
            .cmp(&a.lines_changed)
            .then_with(|| b.commits.cmp(&a.commits))
            .then_with(|| a.path.cmp(&b.path))
    });
    hotspots
}
