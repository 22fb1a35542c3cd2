//! Co-change coupling detection.
//!
//! Identifies pairs of files that frequently change together in commits,
//! which may indicate hidden dependencies or architectural coupling.

use std::collections::HashMap;

use serde::Serialize;
use strata_core::AnalysisConfig;
use tracing::debug;

use crate::index::{ChangeIndex, FileId};

/// A pair of files that changed together.
///
/// # Examples
///
/// ```
/// use strata_engine::coupling::CoChangePair;
///
/// let pair = CoChangePair {
///     file_a: "src/auth.rs".into(),
///     file_b: "src/session.rs".into(),
///     co_change_count: 15,
///     commits_a: 20,
///     commits_b: 18,
///     coupling_ratio: 15.0 / 18.0,
/// };
/// assert!(pair.file_a < pair.file_b);
/// assert!(pair.coupling_ratio <= 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoChangePair {
    /// Lexicographically smaller path.
    pub file_a: String,
    /// Lexicographically larger path.
    pub file_b: String,
    /// Commits touching both files.
    pub co_change_count: u32,
    /// Commits touching `file_a`.
    pub commits_a: u32,
    /// Commits touching `file_b`.
    pub commits_b: u32,
    /// `co_change_count / min(commits_a, commits_b)`.
    pub coupling_ratio: f64,
}

/// Tuning for [`detect_coupling`].
///
/// # Examples
///
/// ```
/// use strata_engine::coupling::CouplingOptions;
///
/// let opts = CouplingOptions::default();
/// assert_eq!(opts.max_files_per_commit, 50);
/// assert_eq!(opts.min_co_changes, 2);
/// assert!(opts.limit.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CouplingOptions {
    /// Commits with more files than this add no pairs (default: 50).
    pub max_files_per_commit: usize,
    /// Pairs seen fewer times are dropped (default: 2, floor 1).
    pub min_co_changes: u32,
    /// Keep only the first `limit` pairs after sorting.
    pub limit: Option<usize>,
}

impl Default for CouplingOptions {
    fn default() -> Self {
        Self {
            max_files_per_commit: 50,
            min_co_changes: 2,
            limit: None,
        }
    }
}

impl CouplingOptions {
    /// Thresholds from the analysis configuration, with a result limit.
    pub fn from_config(config: &AnalysisConfig, limit: Option<usize>) -> Self {
        Self {
            max_files_per_commit: config.max_files_per_commit,
            min_co_changes: config.min_co_changes,
            limit,
        }
    }
}

/// Detect co-change coupling between indexed files.
///
/// Sorted by `coupling_ratio` descending, `co_change_count` descending,
/// then `file_a` and `file_b` ascending.
///
/// # Examples
///
/// ```
/// use strata_engine::coupling::{detect_coupling, CouplingOptions};
/// use strata_engine::exclude::ExcludeSet;
/// use strata_engine::index::ChangeIndex;
/// use strata_engine::mining::{ChangeStatus, CommitInfo, FileChange};
///
/// let touch = |hash: &str| CommitInfo {
///     hash: hash.into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     timestamp: 1000,
///     position: 0,
///     parent_count: 1,
///     message: "change".into(),
///     files_changed: ["a.rs", "b.rs"]
///         .iter()
///         .map(|p| FileChange {
///             path: p.to_string(),
///             lines_added: 1,
///             lines_deleted: 0,
///             status: ChangeStatus::Modified,
///         })
///         .collect(),
/// };
/// let index = ChangeIndex::build(vec![touch("c1"), touch("c2")], &ExcludeSet::default());
/// let pairs = detect_coupling(&index, &CouplingOptions::default());
/// assert_eq!(pairs.len(), 1);
/// assert_eq!(pairs[0].co_change_count, 2);
/// ```
pub fn detect_coupling(index: &ChangeIndex, options: &CouplingOptions) -> Vec<CoChangePair> {
    let min_co_changes = options.min_co_changes.max(1);
    let mut co_changes: HashMap<(FileId, FileId), u32> = HashMap::new();
    let mut skipped = 0usize;

    for commit in index.commits() {
        let files = &commit.files;
        if files.len() > options.max_files_per_commit {
            skipped += 1;
            continue;
        }
        // file ids are ascending, so (i, j) with i < j is already ordered
        for (i, a) in files.iter().enumerate() {
            for b in &files[i + 1..] {
                *co_changes.entry((*a, *b)).or_default() += 1;
            }
        }
    }

    if skipped > 0 {
        debug!(
            skipped,
            max_files = options.max_files_per_commit,
            "large commits left out of pair counting"
        );
    }

    let mut pairs: Vec<CoChangePair> = co_changes
        .into_iter()
        .filter(|(_, count)| *count >= min_co_changes)
        .map(|((a, b), count)| {
            let file_a = index.file(a);
            let file_b = index.file(b);
            let denominator = file_a.commits.min(file_b.commits).max(1);
            CoChangePair {
                file_a: file_a.path.clone(),
                file_b: file_b.path.clone(),
                co_change_count: count,
                commits_a: file_a.commits,
                commits_b: file_b.commits,
                coupling_ratio: count as f64 / denominator as f64,
            }
        })
        .collect();

    pairs.sort_by(|a, b| {
        b.coupling_ratio
            .total_cmp(&a.coupling_ratio)
            .then_with(|| b.co_change_count.cmp(&a.co_change_count))
            .then_with(|| a.file_a.cmp(&b.file_a))
            .then_with(|| a.file_b.cmp(&b.file_b))
    });

    if let Some(limit) = options.limit {
        pairs.truncate(limit);
    }
    pairs
}
