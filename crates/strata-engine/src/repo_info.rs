//! Repository header: name, branch, and the `HEAD` commit.

use std::path::Path;

use git2::{ErrorCode, Repository};
use serde::Serialize;
use strata_core::StrataError;

use crate::mining::CommitReader;

/// Metadata about an opened repository.
///
/// In an empty repository only `name` and `branch` are filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoInfo {
    /// Last component of the repository path.
    pub name: String,
    /// Short name of the checked-out branch, `HEAD` when detached.
    pub branch: String,
    /// First seven characters of the `HEAD` commit hash.
    pub head_hash: String,
    /// Author name of the `HEAD` commit.
    pub last_author: String,
    /// Author email of the `HEAD` commit.
    pub last_email: String,
    /// First line of the `HEAD` commit message.
    pub last_message: String,
    /// How long ago `HEAD` was authored, e.g. `3 days ago`.
    pub last_commit_age: String,
}

/// Describe the repository behind `reader`, with ages measured from `now`
/// (unix seconds).
///
/// # Errors
///
/// Returns [`StrataError::HistoryReadError`] if `HEAD` exists but cannot be
/// resolved to a commit.
pub fn read_repo_info(reader: &CommitReader, now: i64) -> Result<RepoInfo, StrataError> {
    let repo = reader.repository();
    let mut info = RepoInfo {
        name: repo_name(reader.path()),
        branch: current_branch(repo),
        ..RepoInfo::default()
    };

    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(info);
        }
        Err(e) => return Err(StrataError::history("failed to read HEAD", e)),
    };
    let commit = head
        .peel_to_commit()
        .map_err(|e| StrataError::history("HEAD does not point at a commit", e))?;

    let hash = commit.id().to_string();
    let author = commit.author();
    info.head_hash = hash.chars().take(7).collect();
    info.last_author = String::from_utf8_lossy(author.name_bytes()).into_owned();
    info.last_email = String::from_utf8_lossy(author.email_bytes()).into_owned();
    info.last_message = commit.summary().unwrap_or("").trim().to_string();
    info.last_commit_age = relative_age(now - author.when().seconds());
    Ok(info)
}

fn repo_name(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| resolved.display().to_string())
}

fn current_branch(repo: &Repository) -> String {
    repo.find_reference("HEAD")
        .ok()
        .and_then(|head| head.symbolic_target().map(str::to_string))
        .map(|target| {
            target
                .strip_prefix("refs/heads/")
                .unwrap_or(&target)
                .to_string()
        })
        .unwrap_or_else(|| "HEAD".to_string())
}

/// Render an age in seconds as a short English phrase.
///
/// # Examples
///
/// ```
/// use strata_engine::repo_info::relative_age;
///
/// assert_eq!(relative_age(30), "just now");
/// assert_eq!(relative_age(60), "1 minute ago");
/// assert_eq!(relative_age(5 * 3600), "5 hours ago");
/// assert_eq!(relative_age(3 * 86_400 + 10), "3 days ago");
/// ```
pub fn relative_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    match seconds {
        s if s < 60 => "just now".to_string(),
        s if s < 3600 => plural(s / 60, "minute"),
        s if s < 86_400 => plural(s / 3600, "hour"),
        s => plural(s / 86_400, "day"),
    }
}
