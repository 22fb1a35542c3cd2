//! In-memory change index built once per query.
//!
//! [`IndexBuilder`] takes commits in whatever order the reader produces
//! them and stores them arena-style: paths are interned, commits keep
//! `(path id, added, deleted)` triples, and rename events are recorded with
//! the commit's position in history. [`IndexBuilder::finish`] then resolves every path to its
//! logical file, drops excluded files, and produces the read-only
//! [`ChangeIndex`] that all metric computers share.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::exclude::ExcludeSet;
use crate::mining::CommitInfo;

type PathId = u32;

/// Position of a file in [`ChangeIndex::files`].
///
/// Files are stored sorted by path, so comparing two ids compares their
/// paths lexicographically.
pub type FileId = usize;

/// Lines one author added and removed in a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorLines {
    /// Lines added.
    pub added: u64,
    /// Lines removed.
    pub removed: u64,
}

impl AuthorLines {
    /// `added - removed`, floored at zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_engine::index::AuthorLines;
    ///
    /// assert_eq!(AuthorLines { added: 10, removed: 3 }.net(), 7);
    /// assert_eq!(AuthorLines { added: 2, removed: 9 }.net(), 0);
    /// ```
    pub fn net(&self) -> u64 {
        self.added.saturating_sub(self.removed)
    }
}

/// Everything the window says about one logical file.
#[derive(Debug, Clone)]
pub struct FileAggregate {
    /// Logical (post-rename) path.
    pub path: String,
    /// Total lines added.
    pub additions: u64,
    /// Total lines deleted.
    pub deletions: u64,
    /// Distinct commits touching the file.
    pub commits: u32,
    /// Unix timestamp of the most recent commit touching the file.
    pub last_changed: i64,
    /// Per-author line totals keyed by email.
    pub authors: BTreeMap<String, AuthorLines>,
}

impl FileAggregate {
    /// `additions + deletions`.
    pub fn lines_changed(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// Per-author totals keyed by email.
#[derive(Debug, Clone)]
pub struct ContributorAggregate {
    /// Display name from the author's most recent commit.
    pub name: String,
    /// Email, the identity key.
    pub email: String,
    /// Commits touching at least one non-excluded file.
    pub commits: u32,
    /// Lines added to non-excluded files.
    pub additions: u64,
    /// Lines deleted from non-excluded files.
    pub deletions: u64,
    /// Timestamp of the latest commit the name was taken from.
    pub last_seen: i64,
}

/// One commit as the metric computers see it.
#[derive(Debug, Clone)]
pub struct IndexedCommit {
    /// Full commit hash.
    pub hash: String,
    /// Author email.
    pub email: String,
    /// Unix timestamp of authorship.
    pub timestamp: i64,
    /// Non-excluded logical files touched, ascending and de-duplicated.
    /// Empty when every touched file was excluded.
    pub files: Vec<FileId>,
}

/// Read-only change index for one query.
///
/// # Examples
///
/// ```
/// use strata_engine::exclude::ExcludeSet;
/// use strata_engine::index::ChangeIndex;
/// use strata_engine::mining::{ChangeStatus, CommitInfo, FileChange};
///
/// let commit = CommitInfo {
///     hash: "c1".into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     timestamp: 1000,
///     position: 0,
///     parent_count: 0,
///     message: "init".into(),
///     files_changed: vec![FileChange {
///         path: "a.txt".into(),
///         lines_added: 3,
///         lines_deleted: 0,
///         status: ChangeStatus::Added,
///     }],
/// };
/// let index = ChangeIndex::build(vec![commit], &ExcludeSet::default());
/// assert_eq!(index.files()[0].path, "a.txt");
/// assert_eq!(index.commits().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeIndex {
    files: Vec<FileAggregate>,
    commits: Vec<IndexedCommit>,
    contributors: Vec<ContributorAggregate>,
}

impl ChangeIndex {
    /// Build an index from an in-memory commit list.
    pub fn build(
        commits: impl IntoIterator<Item = CommitInfo>,
        exclude: &ExcludeSet,
    ) -> ChangeIndex {
        let mut builder = IndexBuilder::new(exclude.clone());
        for commit in commits {
            builder.push(commit);
        }
        builder.finish()
    }

    /// Per-file aggregates, sorted by path.
    pub fn files(&self) -> &[FileAggregate] {
        &self.files
    }

    /// Aggregate for one file id.
    pub fn file(&self, id: FileId) -> &FileAggregate {
        &self.files[id]
    }

    /// Every commit in the window, including ones whose files were all
    /// excluded.
    pub fn commits(&self) -> &[IndexedCommit] {
        &self.commits
    }

    /// Per-author aggregates, sorted by email. Authors whose commits only
    /// touched excluded files are absent.
    pub fn contributors(&self) -> &[ContributorAggregate] {
        &self.contributors
    }

    /// Look up one contributor by email.
    pub fn contributor(&self, email: &str) -> Option<&ContributorAggregate> {
        self.contributors
            .binary_search_by(|c| c.email.as_str().cmp(email))
            .ok()
            .map(|i| &self.contributors[i])
    }

    /// Whether the window holds no commits at all.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

#[derive(Debug, Default)]
struct PathTable {
    names: Vec<String>,
    ids: HashMap<String, PathId>,
}

impl PathTable {
    fn intern(&mut self, path: String) -> PathId {
        if let Some(&id) = self.ids.get(&path) {
            return id;
        }
        let id = self.names.len() as PathId;
        self.names.push(path.clone());
        self.ids.insert(path, id);
        id
    }

    fn name(&self, id: PathId) -> &str {
        &self.names[id as usize]
    }
}

#[derive(Debug)]
struct DeltaRecord {
    path: PathId,
    added: u64,
    deleted: u64,
}

#[derive(Debug)]
struct CommitRecord {
    hash: String,
    name: String,
    email: String,
    timestamp: i64,
    position: u64,
    deltas: Vec<DeltaRecord>,
}

#[derive(Debug, Clone, Copy)]
struct RenameEvent {
    position: u64,
    to: PathId,
}

#[derive(Debug, Default)]
struct FileAccum {
    additions: u64,
    deletions: u64,
    commits: u32,
    last_commit: Option<usize>,
    last_changed: i64,
    authors: BTreeMap<String, AuthorLines>,
}

/// Accumulates commits, then resolves them into a [`ChangeIndex`].
///
/// # Examples
///
/// ```
/// use strata_engine::exclude::ExcludeSet;
/// use strata_engine::index::IndexBuilder;
///
/// let builder = IndexBuilder::new(ExcludeSet::default());
/// let index = builder.finish();
/// assert!(index.is_empty());
/// ```
#[derive(Debug)]
pub struct IndexBuilder {
    exclude: ExcludeSet,
    paths: PathTable,
    commits: Vec<CommitRecord>,
    seen: HashMap<String, usize>,
    renames: HashMap<PathId, Vec<RenameEvent>>,
    rename_count: usize,
}

impl IndexBuilder {
    /// Start an empty index that will drop files matching `exclude`.
    pub fn new(exclude: ExcludeSet) -> Self {
        Self {
            exclude,
            paths: PathTable::default(),
            commits: Vec::new(),
            seen: HashMap::new(),
            renames: HashMap::new(),
            rename_count: 0,
        }
    }

    /// Record one commit. A hash seen before is ignored.
    pub fn push(&mut self, commit: CommitInfo) {
        if self.seen.contains_key(&commit.hash) {
            debug!(hash = %commit.hash, "duplicate commit ignored");
            return;
        }

        let mut deltas = Vec::with_capacity(commit.files_changed.len());
        for change in commit.files_changed {
            let path = self.paths.intern(change.path);
            if let Some(from) = change.status.renamed_from() {
                let from = self.paths.intern(from.to_string());
                self.renames.entry(from).or_default().push(RenameEvent {
                    position: commit.position,
                    to: path,
                });
                self.rename_count += 1;
            }
            deltas.push(DeltaRecord {
                path,
                added: change.lines_added,
                deleted: change.lines_deleted,
            });
        }

        self.seen.insert(commit.hash.clone(), self.commits.len());
        self.commits.push(CommitRecord {
            hash: commit.hash,
            name: commit.author,
            email: commit.email,
            timestamp: commit.timestamp,
            position: commit.position,
            deltas,
        });
    }

    /// Resolve renames and exclusions and produce the index.
    pub fn finish(mut self) -> ChangeIndex {
        for events in self.renames.values_mut() {
            events.sort_by_key(|e| e.position);
        }

        let mut excluded: HashMap<PathId, bool> = HashMap::new();
        let mut accums: HashMap<PathId, FileAccum> = HashMap::new();
        let mut contributors: BTreeMap<String, ContributorAggregate> = BTreeMap::new();
        let mut commit_paths: Vec<Vec<PathId>> = Vec::with_capacity(self.commits.len());

        for (ci, commit) in self.commits.iter().enumerate() {
            let mut touched = Vec::with_capacity(commit.deltas.len());
            let mut added = 0u64;
            let mut deleted = 0u64;

            for delta in &commit.deltas {
                let logical = self.resolve(delta.path, commit.position);
                let is_excluded = *excluded
                    .entry(logical)
                    .or_insert_with(|| self.exclude.is_excluded(self.paths.name(logical)));
                if is_excluded {
                    continue;
                }

                let accum = accums.entry(logical).or_default();
                accum.additions += delta.added;
                accum.deletions += delta.deleted;
                if accum.last_commit != Some(ci) {
                    accum.last_changed = if accum.commits == 0 {
                        commit.timestamp
                    } else {
                        accum.last_changed.max(commit.timestamp)
                    };
                    accum.commits += 1;
                    accum.last_commit = Some(ci);
                }
                let lines = accum.authors.entry(commit.email.clone()).or_default();
                lines.added += delta.added;
                lines.removed += delta.deleted;

                added += delta.added;
                deleted += delta.deleted;
                touched.push(logical);
            }

            if !touched.is_empty() {
                let entry = contributors
                    .entry(commit.email.clone())
                    .or_insert_with(|| ContributorAggregate {
                        name: commit.name.clone(),
                        email: commit.email.clone(),
                        commits: 0,
                        additions: 0,
                        deletions: 0,
                        last_seen: commit.timestamp,
                    });
                entry.commits += 1;
                entry.additions += added;
                entry.deletions += deleted;
                if (commit.timestamp, commit.name.as_str()) > (entry.last_seen, entry.name.as_str())
                {
                    entry.last_seen = commit.timestamp;
                    entry.name = commit.name.clone();
                }
            }

            commit_paths.push(touched);
        }

        let mut logical_ids: Vec<PathId> = accums.keys().copied().collect();
        logical_ids.sort_by(|a, b| self.paths.name(*a).cmp(self.paths.name(*b)));
        let file_ids: HashMap<PathId, FileId> = logical_ids
            .iter()
            .enumerate()
            .map(|(file_id, path_id)| (*path_id, file_id))
            .collect();

        let files: Vec<FileAggregate> = logical_ids
            .iter()
            .map(|id| {
                let accum = accums.remove(id).unwrap_or_default();
                FileAggregate {
                    path: self.paths.name(*id).to_string(),
                    additions: accum.additions,
                    deletions: accum.deletions,
                    commits: accum.commits,
                    last_changed: accum.last_changed,
                    authors: accum.authors,
                }
            })
            .collect();

        let commits: Vec<IndexedCommit> = self
            .commits
            .into_iter()
            .zip(commit_paths)
            .map(|(record, paths)| {
                let mut files: Vec<FileId> = paths.iter().map(|p| file_ids[p]).collect();
                files.sort_unstable();
                files.dedup();
                IndexedCommit {
                    hash: record.hash,
                    email: record.email,
                    timestamp: record.timestamp,
                    files,
                }
            })
            .collect();

        debug!(
            commits = commits.len(),
            files = files.len(),
            contributors = contributors.len(),
            renames = self.rename_count,
            "change index built"
        );

        ChangeIndex {
            files,
            commits,
            contributors: contributors.into_values().collect(),
        }
    }

    /// Follow rename events forward in history from an occurrence of `path`
    /// in the commit at `position`.
    ///
    /// A rename `old -> new` claims occurrences of `old` in commits older
    /// than the rename, up to the previous rename away from `old`. In the
    /// rename commit itself and after it, `old` names whatever file lives
    /// there next.
    fn resolve(&self, path: PathId, position: u64) -> PathId {
        let mut current = path;
        let mut position = position;
        for _ in 0..self.rename_count {
            // sorted newest first; the last one newer than the occurrence is next
            let next = self.renames.get(&current).and_then(|events| {
                let newer = events.partition_point(|e| e.position < position);
                newer.checked_sub(1).map(|i| events[i])
            });
            match next {
                Some(event) if event.to != current => {
                    current = event.to;
                    position = event.position;
                }
                _ => break,
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{change, make_commit, renamed};

    fn build(commits: Vec<CommitInfo>) -> ChangeIndex {
        ChangeIndex::build(commits, &ExcludeSet::default())
    }

    fn exclude(patterns: &[&str]) -> ExcludeSet {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        ExcludeSet::new(&owned).unwrap()
    }

    fn file<'a>(index: &'a ChangeIndex, path: &str) -> &'a FileAggregate {
        index
            .files()
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("{path} not in index"))
    }

    #[test]
    fn aggregates_per_file() {
        let index = build(vec![
            make_commit("c1", "alice", 100, vec![change("a.txt", 10, 0), change("b.txt", 10, 0)]),
            make_commit("c2", "bob", 200, vec![change("a.txt", 5, 2)]),
        ]);

        let a = file(&index, "a.txt");
        assert_eq!(a.additions, 15);
        assert_eq!(a.deletions, 2);
        assert_eq!(a.commits, 2);
        assert_eq!(a.last_changed, 200);
        assert_eq!(a.authors.len(), 2);
        assert_eq!(a.authors["bob@example.com"], AuthorLines { added: 5, removed: 2 });

        let b = file(&index, "b.txt");
        assert_eq!(b.commits, 1);
        assert_eq!(b.last_changed, 100);
    }

    #[test]
    fn files_are_sorted_by_path() {
        let index = build(vec![make_commit(
            "c1",
            "alice",
            100,
            vec![change("z.rs", 1, 0), change("a.rs", 1, 0), change("m/x.rs", 1, 0)],
        )]);
        let paths: Vec<&str> = index.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "m/x.rs", "z.rs"]);
        assert_eq!(index.commits()[0].files, vec![0, 1, 2]);
    }

    #[test]
    fn last_changed_does_not_depend_on_arrival_order() {
        let index = build(vec![
            make_commit("old", "alice", 100, vec![change("a.txt", 1, 0)]),
            make_commit("new", "alice", 900, vec![change("a.txt", 1, 0)]),
            make_commit("mid", "alice", 500, vec![change("a.txt", 1, 0)]),
        ]);
        assert_eq!(file(&index, "a.txt").last_changed, 900);
    }

    #[test]
    fn rename_unifies_history_newest_first() {
        let index = build(vec![
            make_commit("c3", "alice", 300, vec![change("new.rs", 4, 1)]),
            make_commit("c2", "alice", 200, vec![renamed("old.rs", "new.rs", 1, 1)]),
            make_commit("c1", "bob", 100, vec![change("old.rs", 20, 0)]),
        ]);

        assert_eq!(index.files().len(), 1);
        let f = file(&index, "new.rs");
        assert_eq!(f.commits, 3);
        assert_eq!(f.additions, 25);
        assert_eq!(f.deletions, 2);
        assert!(f.authors.contains_key("bob@example.com"));
    }

    #[test]
    fn rename_unifies_history_oldest_first() {
        let index = build(vec![
            make_commit("c1", "bob", 100, vec![change("old.rs", 20, 0)]),
            make_commit("c2", "alice", 200, vec![renamed("old.rs", "new.rs", 1, 1)]),
            make_commit("c3", "alice", 300, vec![change("new.rs", 4, 1)]),
        ]);
        assert_eq!(index.files().len(), 1);
        assert_eq!(file(&index, "new.rs").commits, 3);
    }

    #[test]
    fn rename_chain_resolves_to_latest_name() {
        let index = build(vec![
            make_commit("c1", "alice", 100, vec![change("a.rs", 10, 0)]),
            make_commit("c2", "alice", 200, vec![renamed("a.rs", "b.rs", 0, 0)]),
            make_commit("c3", "alice", 300, vec![renamed("b.rs", "c.rs", 0, 0)]),
        ]);
        assert_eq!(index.files().len(), 1);
        let f = file(&index, "c.rs");
        assert_eq!(f.commits, 3);
        assert_eq!(f.additions, 10);
    }

    #[test]
    fn path_reused_after_rename_stays_separate() {
        let index = build(vec![
            make_commit("c1", "alice", 100, vec![change("a.rs", 10, 0)]),
            make_commit("c2", "alice", 200, vec![renamed("a.rs", "b.rs", 0, 0)]),
            make_commit("c3", "alice", 300, vec![change("a.rs", 7, 0)]),
        ]);
        assert_eq!(file(&index, "b.rs").additions, 10);
        assert_eq!(file(&index, "a.rs").additions, 7);
        assert_eq!(file(&index, "a.rs").commits, 1);
    }

    #[test]
    fn rename_cycle_terminates() {
        let index = build(vec![
            make_commit("c1", "alice", 100, vec![change("a.rs", 1, 0)]),
            make_commit(
                "c2",
                "alice",
                200,
                vec![renamed("a.rs", "b.rs", 0, 0), renamed("b.rs", "a.rs", 0, 0)],
            ),
        ]);
        assert!(!index.files().is_empty());
    }

    #[test]
    fn excluded_files_vanish_everywhere() {
        let commits = vec![
            make_commit("c1", "alice", 100, vec![change("a.rs", 1, 0), change("Cargo.lock", 50, 0)]),
            make_commit("c2", "bob", 200, vec![change("Cargo.lock", 9, 9)]),
        ];
        let index = ChangeIndex::build(commits, &exclude(&["*.lock"]));

        assert!(index.files().iter().all(|f| f.path != "Cargo.lock"));
        assert_eq!(index.commits().len(), 2);
        let c2 = index.commits().iter().find(|c| c.hash == "c2").unwrap();
        assert!(c2.files.is_empty());

        // bob only touched excluded files
        assert!(index.contributor("bob@example.com").is_none());
        let alice = index.contributor("alice@example.com").unwrap();
        assert_eq!(alice.commits, 1);
        assert_eq!(alice.additions, 1);
    }

    #[test]
    fn exclusion_applies_to_logical_path() {
        let commits = vec![
            make_commit("c1", "alice", 100, vec![change("src/old.rs", 5, 0)]),
            make_commit("c2", "alice", 200, vec![renamed("src/old.rs", "vendor/old.rs", 0, 0)]),
        ];
        let index = ChangeIndex::build(commits, &exclude(&["vendor/*"]));
        assert!(index.files().is_empty());
    }

    #[test]
    fn contributor_name_is_last_seen() {
        let mut early = make_commit("c1", "alice", 100, vec![change("a.rs", 1, 0)]);
        early.author = "Alice Old".into();
        let mut late = make_commit("c2", "alice", 900, vec![change("a.rs", 1, 0)]);
        late.author = "Alice New".into();

        let index = build(vec![late, early]);
        let alice = index.contributor("alice@example.com").unwrap();
        assert_eq!(alice.name, "Alice New");
        assert_eq!(alice.commits, 2);
    }

    #[test]
    fn duplicate_commits_count_once() {
        let commit = make_commit("c1", "alice", 100, vec![change("a.rs", 3, 0)]);
        let index = build(vec![commit.clone(), commit]);
        assert_eq!(index.commits().len(), 1);
        assert_eq!(file(&index, "a.rs").additions, 3);
    }

    #[test]
    fn path_reused_in_the_rename_commit_is_a_new_file() {
        let index = build(vec![
            make_commit("c1", "alice", 100, vec![change("a.rs", 2, 0)]),
            make_commit(
                "c2",
                "alice",
                200,
                vec![renamed("a.rs", "b.rs", 1, 0), change("a.rs", 4, 0)],
            ),
        ]);
        let b = file(&index, "b.rs");
        assert_eq!(b.commits, 2);
        assert_eq!(b.additions, 3);
        assert_eq!(file(&index, "a.rs").additions, 4);
        assert_eq!(index.commits()[1].files.len(), 2);
    }

    fn at_position(position: u64, mut commit: CommitInfo) -> CommitInfo {
        commit.position = position;
        commit
    }

    #[test]
    fn rename_follows_history_order_over_author_time() {
        // a rebased edit to old.rs carries a later author date than the
        // rename that comes after it in history
        let index = build(vec![
            at_position(2, make_commit("c1", "alice", 100, vec![change("old.rs", 20, 0)])),
            at_position(1, make_commit("c2", "alice", 400, vec![change("old.rs", 2, 0)])),
            at_position(0, make_commit("c3", "alice", 300, vec![renamed("old.rs", "new.rs", 0, 0)])),
        ]);
        assert_eq!(index.files().len(), 1);
        let f = file(&index, "new.rs");
        assert_eq!(f.commits, 3);
        assert_eq!(f.additions, 22);
        assert_eq!(f.last_changed, 400);
    }

    #[test]
    fn path_readded_in_the_same_second_stays_separate() {
        let index = build(vec![
            at_position(0, make_commit("c3", "alice", 100, vec![change("old.rs", 1, 0)])),
            at_position(1, make_commit("c2", "alice", 100, vec![renamed("old.rs", "new.rs", 0, 0)])),
            at_position(2, make_commit("c1", "alice", 100, vec![change("old.rs", 5, 0)])),
        ]);
        assert_eq!(file(&index, "new.rs").commits, 2);
        assert_eq!(file(&index, "new.rs").additions, 5);
        assert_eq!(file(&index, "old.rs").commits, 1);
        assert_eq!(file(&index, "old.rs").additions, 1);
    }
}
