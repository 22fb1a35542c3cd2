//! Per-file ownership distribution.
//!
//! An author "owns" the lines they added and did not take back: each
//! author's stake in a file is `added - removed`, floored at zero. The top
//! two stakeholders are reported as fractions of the file's total net lines.

use serde::Serialize;

use crate::index::{AuthorLines, ChangeIndex};

/// Who owns one file.
///
/// # Examples
///
/// ```
/// use strata_engine::ownership::FileOwnership;
///
/// let ownership = FileOwnership {
///     path: "src/main.rs".into(),
///     top_author_name: "alice".into(),
///     top_author_email: "alice@example.com".into(),
///     top_author_pct: 0.8,
///     second_author_name: "bob".into(),
///     second_author_email: "bob@example.com".into(),
///     second_author_pct: 0.2,
///     contributor_count: 2,
///     total_lines: 100,
/// };
/// assert!(ownership.top_author_pct + ownership.second_author_pct <= 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOwnership {
    /// Logical file path relative to repo root.
    pub path: String,
    /// Display name of the largest stakeholder.
    pub top_author_name: String,
    /// Email of the largest stakeholder.
    pub top_author_email: String,
    /// `top_net / total_lines`.
    pub top_author_pct: f64,
    /// Display name of the runner-up, empty with fewer than two authors.
    pub second_author_name: String,
    /// Email of the runner-up, empty with fewer than two authors.
    pub second_author_email: String,
    /// `second_net / total_lines`, 0 with fewer than two authors.
    pub second_author_pct: f64,
    /// Distinct authors with any change to the file.
    pub contributor_count: u32,
    /// Sum of every author's net lines.
    pub total_lines: u64,
}

/// Compute ownership for every file with a positive net line total.
///
/// Authors are ranked by net lines descending, then email ascending. The
/// result is sorted by `top_author_pct` descending, `total_lines`
/// descending, then path ascending.
///
/// # Examples
///
/// ```
/// use strata_engine::exclude::ExcludeSet;
/// use strata_engine::index::ChangeIndex;
/// use strata_engine::mining::{ChangeStatus, CommitInfo, FileChange};
/// use strata_engine::ownership::analyze_ownership;
///
/// let commits = vec![CommitInfo {
///     hash: "abc".into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     timestamp: 1000,
///     position: 0,
///     parent_count: 0,
///     message: "init".into(),
///     files_changed: vec![FileChange {
///         path: "main.rs".into(),
///         lines_added: 50,
///         lines_deleted: 0,
///         status: ChangeStatus::Added,
///     }],
/// }];
/// let index = ChangeIndex::build(commits, &ExcludeSet::default());
/// let files = analyze_ownership(&index);
/// assert_eq!(files[0].top_author_pct, 1.0);
/// assert_eq!(files[0].second_author_email, "");
/// ```
pub fn analyze_ownership(index: &ChangeIndex) -> Vec<FileOwnership> {
    let mut files = Vec::new();

    for file in index.files() {
        let total_lines: u64 = file.authors.values().map(AuthorLines::net).sum();
        if total_lines == 0 {
            continue;
        }

        let mut ranked: Vec<(&str, u64)> = file
            .authors
            .iter()
            .map(|(email, lines)| (email.as_str(), lines.net()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let share = |net: u64| net as f64 / total_lines as f64;
        let (top_email, top_net) = ranked[0];
        let (second_email, second_net) = ranked.get(1).copied().unwrap_or(("", 0));

        files.push(FileOwnership {
            path: file.path.clone(),
            top_author_name: display_name(index, top_email),
            top_author_email: top_email.to_string(),
            top_author_pct: share(top_net),
            second_author_name: display_name(index, second_email),
            second_author_email: second_email.to_string(),
            second_author_pct: share(second_net),
            contributor_count: ranked.len() as u32,
            total_lines,
        });
    }

    files.sort_by(|a, b| {
        b.top_author_pct
            .total_cmp(&a.top_author_pct)
            .then_with(|| b.total_lines.cmp(&a.total_lines))
            .then_with(|| a.path.cmp(&b.path))
    });
    files
}

fn display_name(index: &ChangeIndex, email: &str) -> String {
    if email.is_empty() {
        return String::new();
    }
    index
        .contributor(email)
        .map_or_else(|| email.to_string(), |c| c.name.clone())
}
