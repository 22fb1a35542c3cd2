//! Window-wide totals computed in one streaming pass, without an index.

use std::collections::HashSet;

use serde::Serialize;

use crate::exclude::ExcludeSet;
use crate::mining::CommitInfo;

/// Headline numbers for a date window.
///
/// `commits` and `contributors` count every commit in the window; the line
/// and file totals skip excluded paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Commits in the window.
    pub commits: u64,
    /// Distinct author emails in the window.
    pub contributors: u64,
    /// Lines added to non-excluded files.
    pub additions: u64,
    /// Lines deleted from non-excluded files.
    pub deletions: u64,
    /// Distinct non-excluded paths as reported by the diffs.
    pub files_changed: u64,
}

/// Running totals fed one commit at a time.
///
/// # Examples
///
/// ```
/// use strata_engine::dashboard::DashboardBuilder;
/// use strata_engine::exclude::ExcludeSet;
/// use strata_engine::mining::CommitInfo;
///
/// let mut builder = DashboardBuilder::new(ExcludeSet::default());
/// builder.push(&CommitInfo {
///     hash: "c1".into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     timestamp: 1000,
///     position: 0,
///     parent_count: 0,
///     message: "init".into(),
///     files_changed: vec![],
/// });
/// let stats = builder.finish();
/// assert_eq!(stats.commits, 1);
/// assert_eq!(stats.contributors, 1);
/// ```
#[derive(Debug)]
pub struct DashboardBuilder {
    exclude: ExcludeSet,
    stats: DashboardStats,
    emails: HashSet<String>,
    paths: HashSet<String>,
}

impl DashboardBuilder {
    /// Start from zero, skipping paths matching `exclude` in line totals.
    pub fn new(exclude: ExcludeSet) -> Self {
        Self {
            exclude,
            stats: DashboardStats::default(),
            emails: HashSet::new(),
            paths: HashSet::new(),
        }
    }

    /// Fold one commit into the totals.
    pub fn push(&mut self, commit: &CommitInfo) {
        self.stats.commits += 1;
        if !self.emails.contains(&commit.email) {
            self.emails.insert(commit.email.clone());
        }
        for change in &commit.files_changed {
            if self.exclude.is_excluded(&change.path) {
                continue;
            }
            self.stats.additions += change.lines_added;
            self.stats.deletions += change.lines_deleted;
            if !self.paths.contains(&change.path) {
                self.paths.insert(change.path.clone());
            }
        }
    }

    /// The final totals.
    pub fn finish(mut self) -> DashboardStats {
        self.stats.contributors = self.emails.len() as u64;
        self.stats.files_changed = self.paths.len() as u64;
        self.stats
    }
}
