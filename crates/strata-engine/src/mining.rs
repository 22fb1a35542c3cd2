//! Git history extraction via git2.
//!
//! Streams commit history from a repository, extracting per-commit file
//! changes with line counts, author info, and timestamps. Renames are
//! reported by git's similarity detection and surface as
//! [`ChangeStatus::Renamed`].

use std::path::{Path, PathBuf};

use git2::{Delta, Diff, DiffDelta, DiffFindOptions, DiffOptions, ErrorCode, Oid, Patch};
use git2::{Repository, Revwalk, Sort};
use strata_core::{AnalysisConfig, Cancellation, DateRange, StrataError};
use tracing::{debug, warn};

/// Raw commit data extracted from git history.
///
/// # Examples
///
/// ```
/// use strata_engine::mining::CommitInfo;
///
/// let info = CommitInfo {
///     hash: "abc123".into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     timestamp: 1700000000,
///     position: 0,
///     parent_count: 1,
///     message: "fix: auth bug".into(),
///     files_changed: vec![],
/// };
/// assert_eq!(info.position, 0);
/// ```
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Unix timestamp of authorship (UTC).
    pub timestamp: i64,
    /// Place in the walk's topological order: 0 is the tip, and a commit
    /// always sits before its parents, whatever its author time says.
    pub position: u64,
    /// Number of parents: 0 for a root commit, 2+ for a merge.
    pub parent_count: usize,
    /// First line of commit message.
    pub message: String,
    /// Files changed relative to the first parent.
    pub files_changed: Vec<FileChange>,
}

/// A single file change within a commit.
///
/// # Examples
///
/// ```
/// use strata_engine::mining::{FileChange, ChangeStatus};
///
/// let change = FileChange {
///     path: "src/main.rs".into(),
///     lines_added: 10,
///     lines_deleted: 3,
///     status: ChangeStatus::Modified,
/// };
/// assert_eq!(change.lines_changed(), 13);
/// ```
#[derive(Debug, Clone)]
pub struct FileChange {
    /// File path relative to repo root. For deletions this is the removed
    /// path; otherwise the path after the change.
    pub path: String,
    /// Lines added in this commit.
    pub lines_added: u64,
    /// Lines deleted in this commit.
    pub lines_deleted: u64,
    /// Type of change.
    pub status: ChangeStatus,
}

impl FileChange {
    /// `lines_added + lines_deleted`.
    pub fn lines_changed(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }
}

/// Status of a file change within a commit.
///
/// # Examples
///
/// ```
/// use strata_engine::mining::ChangeStatus;
///
/// let status = ChangeStatus::Renamed { from: "old.rs".into() };
/// assert_eq!(status.renamed_from(), Some("old.rs"));
/// assert_eq!(ChangeStatus::Added.renamed_from(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    /// New file.
    Added,
    /// Existing file modified.
    Modified,
    /// File removed.
    Deleted,
    /// File renamed from another path.
    Renamed {
        /// Original path before rename.
        from: String,
    },
}

impl ChangeStatus {
    /// The pre-rename path, if this change is a rename.
    pub fn renamed_from(&self) -> Option<&str> {
        match self {
            ChangeStatus::Renamed { from } => Some(from),
            _ => None,
        }
    }
}

/// Options for history mining.
///
/// # Examples
///
/// ```
/// use strata_engine::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert_eq!(opts.rename_similarity, 50);
/// assert!(opts.branch.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MiningOptions {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Similarity percentage git needs to call a delete+add a rename
    /// (default: 50).
    pub rename_similarity: u16,
}

impl Default for MiningOptions {
    fn default() -> Self {
        Self {
            branch: None,
            rename_similarity: 50,
        }
    }
}

impl MiningOptions {
    /// Take the mining-related keys out of the analysis configuration.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            branch: config.branch.clone(),
            rename_similarity: config.rename_similarity,
        }
    }
}

/// An opened repository that can stream its history.
///
/// Each call to [`CommitReader::commits`] starts a fresh walk, so a reader
/// can serve several single-pass streams one after another.
pub struct CommitReader {
    repo: Repository,
    path: PathBuf,
    options: MiningOptions,
}

impl CommitReader {
    /// Open the git repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::RepositoryUnavailable`] if `path` is not a git
    /// repository or cannot be read.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use strata_engine::mining::{CommitReader, MiningOptions};
    ///
    /// let reader = CommitReader::open(Path::new("."), MiningOptions::default()).unwrap();
    /// ```
    pub fn open(path: &Path, options: MiningOptions) -> Result<Self, StrataError> {
        let repo = Repository::open(path).map_err(|e| StrataError::RepositoryUnavailable {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        debug!(path = %path.display(), "opened repository");
        Ok(Self {
            repo,
            path: path.to_path_buf(),
            options,
        })
    }

    /// The underlying git2 repository.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The path the reader was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream commits whose author time falls inside `window`.
    ///
    /// Commits arrive in topological order, children before parents, with
    /// ties broken by commit time. Each carries its `position` in that
    /// order; consumers must not depend on arrival order itself. Root
    /// commits diff against the empty tree and merges against their first
    /// parent. An unborn `HEAD` yields an empty stream.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::HistoryReadError`] if the walk cannot be set
    /// up. Failures while streaming are yielded as the stream's last item.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use strata_core::{Cancellation, DateRange};
    /// use strata_engine::mining::{CommitReader, MiningOptions};
    ///
    /// let reader = CommitReader::open(Path::new("."), MiningOptions::default()).unwrap();
    /// let range = DateRange::parse("2025-01-01", "2025-07-01").unwrap();
    /// for commit in reader.commits(Some(range), &Cancellation::new()).unwrap() {
    ///     let commit = commit.unwrap();
    ///     println!("{}: {} ({})", &commit.hash[..7], commit.message, commit.author);
    /// }
    /// ```
    pub fn commits(
        &self,
        window: Option<DateRange>,
        cancel: &Cancellation,
    ) -> Result<CommitStream<'_>, StrataError> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| StrataError::history("failed to create revwalk", e))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| StrataError::history("failed to sort revwalk", e))?;

        let started = match self.options.branch {
            Some(ref branch) => {
                let reference = self
                    .repo
                    .resolve_reference_from_short_name(branch)
                    .map_err(|e| {
                        StrataError::history(&format!("failed to resolve branch '{branch}'"), e)
                    })?;
                let oid = reference
                    .peel_to_commit()
                    .map_err(|e| StrataError::history("branch does not point at a commit", e))?
                    .id();
                revwalk
                    .push(oid)
                    .map_err(|e| StrataError::history("failed to push branch", e))?;
                true
            }
            None => match revwalk.push_head() {
                Ok(()) => true,
                Err(e) if is_unborn(&e) => {
                    debug!("HEAD is unborn, history is empty");
                    false
                }
                Err(e) => return Err(StrataError::history("failed to push HEAD", e)),
            },
        };

        Ok(CommitStream {
            repo: &self.repo,
            revwalk: started.then_some(revwalk),
            window,
            cancel: cancel.clone(),
            rename_similarity: self.options.rename_similarity,
            position: 0,
            done: false,
        })
    }
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

/// Lazy, single-pass iterator over the commits of one walk.
///
/// Yields at most one `Err`: after a failure or a cancellation the stream
/// is finished.
pub struct CommitStream<'repo> {
    repo: &'repo Repository,
    revwalk: Option<Revwalk<'repo>>,
    window: Option<DateRange>,
    cancel: Cancellation,
    rename_similarity: u16,
    position: u64,
    done: bool,
}

impl Iterator for CommitStream<'_> {
    type Item = Result<CommitInfo, StrataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let revwalk = self.revwalk.as_mut()?;

        loop {
            if self.cancel.is_cancelled() {
                self.done = true;
                return Some(Err(StrataError::Cancelled));
            }

            let oid = match revwalk.next()? {
                Ok(oid) => oid,
                Err(e) => {
                    self.done = true;
                    return Some(Err(StrataError::history("revwalk error", e)));
                }
            };

            let position = self.position;
            self.position += 1;

            match read_commit(
                self.repo,
                oid,
                position,
                self.window.as_ref(),
                self.rename_similarity,
            ) {
                Ok(Some(info)) => return Some(Ok(info)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn read_commit(
    repo: &Repository,
    oid: Oid,
    position: u64,
    window: Option<&DateRange>,
    rename_similarity: u16,
) -> Result<Option<CommitInfo>, StrataError> {
    let commit = repo
        .find_commit(oid)
        .map_err(|e| StrataError::history("failed to find commit", e))?;

    let author = commit.author();
    let timestamp = author.when().seconds();
    if let Some(window) = window {
        if !window.contains(timestamp) {
            return Ok(None);
        }
    }

    let files_changed = extract_file_changes(repo, &commit, rename_similarity)?;

    Ok(Some(CommitInfo {
        hash: oid.to_string(),
        author: String::from_utf8_lossy(author.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
        timestamp,
        position,
        parent_count: commit.parent_count(),
        message: commit.summary().unwrap_or("").to_string(),
        files_changed,
    }))
}

fn extract_file_changes(
    repo: &Repository,
    commit: &git2::Commit<'_>,
    rename_similarity: u16,
) -> Result<Vec<FileChange>, StrataError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| StrataError::history("failed to get commit tree", e))?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| StrataError::history("failed to get parent", e))?;
        Some(
            parent
                .tree()
                .map_err(|e| StrataError::history("failed to get parent tree", e))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    let mut diff = repo
        .diff_tree_to_tree(
            parent_tree.as_ref(),
            Some(&commit_tree),
            Some(&mut diff_opts),
        )
        .map_err(|e| StrataError::history("failed to compute diff", e))?;

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true).rename_threshold(rename_similarity);
    diff.find_similar(Some(&mut find_opts))
        .map_err(|e| StrataError::history("failed to find renames", e))?;

    let mut changes = Vec::with_capacity(diff.deltas().len());
    for (idx, delta) in diff.deltas().enumerate() {
        let Some(status) = change_status(delta.status(), || renamed_from(&delta))
            .map_err(|e| {
                StrataError::history(
                    &format!("{} in commit {}", delta_path(&delta), commit.id()),
                    e,
                )
            })?
        else {
            continue;
        };

        let side = if status == ChangeStatus::Deleted {
            delta.old_file()
        } else {
            delta.new_file()
        };
        let path = side
            .path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        if path.is_empty() {
            warn!(commit = %commit.id(), "delta without a path, skipping");
            continue;
        }

        let (lines_added, lines_deleted) = line_stats(&diff, idx)?;
        changes.push(FileChange {
            path,
            lines_added,
            lines_deleted,
            status,
        });
    }

    Ok(changes)
}

/// Map git's delta status onto a [`ChangeStatus`]. Statuses that carry no
/// change are `None`; an unreadable side is an error.
fn change_status(
    status: Delta,
    renamed_from: impl FnOnce() -> Option<String>,
) -> Result<Option<ChangeStatus>, String> {
    let status = match status {
        Delta::Added | Delta::Copied => ChangeStatus::Added,
        Delta::Deleted => ChangeStatus::Deleted,
        Delta::Modified | Delta::Typechange => ChangeStatus::Modified,
        Delta::Renamed => match renamed_from() {
            Some(from) => ChangeStatus::Renamed { from },
            None => ChangeStatus::Modified,
        },
        Delta::Unreadable => return Err("delta is unreadable".to_string()),
        other => {
            debug!(status = ?other, "skipping delta");
            return Ok(None);
        }
    };
    Ok(Some(status))
}

fn delta_path(delta: &DiffDelta<'_>) -> String {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown path>".to_string())
}

/// The old path of a delta git reported as a rename.
fn renamed_from(delta: &DiffDelta<'_>) -> Option<String> {
    let old = delta.old_file().path()?.to_string_lossy().to_string();
    let new = delta.new_file().path()?.to_string_lossy().to_string();
    (old != new && !old.is_empty()).then_some(old)
}

/// Added/deleted line counts for one delta. Binary files count as 0/0.
fn line_stats(diff: &Diff<'_>, idx: usize) -> Result<(u64, u64), StrataError> {
    let Some(patch) =
        Patch::from_diff(diff, idx).map_err(|e| StrataError::history("failed to build patch", e))?
    else {
        return Ok((0, 0));
    };
    let (_context, additions, deletions) = patch
        .line_stats()
        .map_err(|e| StrataError::history("failed to count lines", e))?;
    Ok((additions as u64, deletions as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mining_options_defaults_are_correct() {
        let opts = MiningOptions::default();
        assert_eq!(opts.rename_similarity, 50);
        assert!(opts.branch.is_none());
    }

    #[test]
    fn mining_options_follow_config() {
        let config = AnalysisConfig {
            branch: Some("develop".into()),
            rename_similarity: 80,
            ..AnalysisConfig::default()
        };
        let opts = MiningOptions::from_config(&config);
        assert_eq!(opts.branch.as_deref(), Some("develop"));
        assert_eq!(opts.rename_similarity, 80);
    }

    #[test]
    fn open_non_repository_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = CommitReader::open(dir.path(), MiningOptions::default());
        match result {
            Err(StrataError::RepositoryUnavailable { path, .. }) => {
                assert_eq!(path, dir.path());
            }
            Err(other) => panic!("expected RepositoryUnavailable, got {other:?}"),
            Ok(_) => panic!("expected an error for a plain directory"),
        }
    }

    #[test]
    fn empty_repository_streams_nothing() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let reader = CommitReader::open(dir.path(), MiningOptions::default()).unwrap();
        let commits: Vec<_> = reader
            .commits(None, &Cancellation::new())
            .unwrap()
            .collect();
        assert!(commits.is_empty());
    }

    #[test]
    fn unreadable_delta_is_an_error() {
        assert!(change_status(Delta::Unreadable, || None).is_err());
        assert_eq!(change_status(Delta::Unmodified, || None), Ok(None));
        assert_eq!(
            change_status(Delta::Renamed, || Some("old.rs".into())),
            Ok(Some(ChangeStatus::Renamed {
                from: "old.rs".into()
            }))
        );
        assert_eq!(
            change_status(Delta::Renamed, || None),
            Ok(Some(ChangeStatus::Modified))
        );
    }

    /// Write a commit object by hand so the identity can hold raw bytes.
    fn raw_commit(repo: &Repository, parent: Option<Oid>, identity: &[u8], time: i64) -> Oid {
        let tree = repo.treebuilder(None).unwrap().write().unwrap();
        let mut buf = format!("tree {tree}\n").into_bytes();
        if let Some(parent) = parent {
            buf.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }
        for role in ["author", "committer"] {
            buf.extend_from_slice(role.as_bytes());
            buf.push(b' ');
            buf.extend_from_slice(identity);
            buf.extend_from_slice(format!(" {time} +0000\n").as_bytes());
        }
        buf.extend_from_slice(b"\nraw\n");
        repo.odb()
            .unwrap()
            .write(git2::ObjectType::Commit, &buf)
            .unwrap()
    }

    #[test]
    fn non_utf8_identities_stay_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = raw_commit(&repo, None, b"Ren\xe9 <ren\xe9@example.com>", 1_000);
        let second = raw_commit(&repo, Some(first), b"Zo\xeb <zo\xeb@example.com>", 2_000);
        repo.reference("refs/heads/odd", second, true, "test").unwrap();
        repo.set_head("refs/heads/odd").unwrap();

        let reader = CommitReader::open(dir.path(), MiningOptions::default()).unwrap();
        let commits: Vec<CommitInfo> = reader
            .commits(None, &Cancellation::new())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(commits.len(), 2);
        assert_ne!(commits[0].email, commits[1].email);
        assert!(commits.iter().all(|c| c.email.ends_with("@example.com")));
        assert!(commits.iter().all(|c| c.email != "unknown"));
    }

    #[test]
    fn positions_follow_parents_not_author_time() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = b"a <a@example.com>";
        // `side` is a child of `base` but claims to be older; the merge sees both
        let base = raw_commit(&repo, None, id, 5_000);
        let side = raw_commit(&repo, Some(base), id, 1_000);
        let tree = repo.treebuilder(None).unwrap().write().unwrap();
        let merge = repo
            .odb()
            .unwrap()
            .write(
                git2::ObjectType::Commit,
                format!(
                    "tree {tree}\nparent {base}\nparent {side}\n\
                     author a <a@example.com> 9000 +0000\n\
                     committer a <a@example.com> 9000 +0000\n\nmerge\n"
                )
                .as_bytes(),
            )
            .unwrap();
        repo.reference("refs/heads/main", merge, true, "test").unwrap();
        repo.set_head("refs/heads/main").unwrap();

        let reader = CommitReader::open(dir.path(), MiningOptions::default()).unwrap();
        let commits: Vec<CommitInfo> = reader
            .commits(None, &Cancellation::new())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let pos = |oid: Oid| {
            commits
                .iter()
                .find(|c| c.hash == oid.to_string())
                .unwrap()
                .position
        };
        assert_eq!(pos(merge), 0);
        assert!(pos(side) < pos(base));
    }

    #[test]
    fn change_status_identifies_correctly() {
        let renamed = ChangeStatus::Renamed {
            from: "old.rs".into(),
        };
        assert_eq!(renamed.renamed_from(), Some("old.rs"));
        assert_eq!(ChangeStatus::Deleted.renamed_from(), None);
        assert_ne!(renamed, ChangeStatus::Modified);
    }
}
