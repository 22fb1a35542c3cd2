//! Contributor leaderboard.

use serde::Serialize;

use crate::index::ChangeIndex;

/// One author's totals over the window.
///
/// # Examples
///
/// ```
/// use strata_engine::contributors::Contributor;
///
/// let c = Contributor {
///     author_name: "alice".into(),
///     author_email: "alice@example.com".into(),
///     commits: 42,
///     additions: 1200,
///     deletions: 300,
/// };
/// assert_eq!(c.commits, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contributor {
    /// Name on the author's most recent commit.
    pub author_name: String,
    /// Email, the identity key.
    pub author_email: String,
    /// Commits touching at least one non-excluded file.
    pub commits: u32,
    /// Lines added to non-excluded files.
    pub additions: u64,
    /// Lines deleted from non-excluded files.
    pub deletions: u64,
}

/// List every contributor, busiest first.
///
/// Sorted by commits descending, additions descending, name ascending, then
/// email ascending.
pub fn aggregate_contributors(index: &ChangeIndex) -> Vec<Contributor> {
    let mut contributors: Vec<Contributor> = index
        .contributors()
        .iter()
        .map(|c| Contributor {
            author_name: c.name.clone(),
            author_email: c.email.clone(),
            commits: c.commits,
            additions: c.additions,
            deletions: c.deletions,
        })
        .collect();

    contributors.sort_by(|a, b| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| b.additions.cmp(&a.additions))
            .then_with(|| a.author_name.cmp(&b.author_name))
            .then_with(|| a.author_email.cmp(&b.author_email))
    });
    contributors
}
