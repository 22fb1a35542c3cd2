//! Throwaway git repositories for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use git2::{IndexAddOption, Oid, Repository, Signature, Time};
use strata_core::DateRange;
use tempfile::TempDir;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn write_lines(&self, path: &str, prefix: &str, count: usize) {
        self.write(path, &lines(prefix, count));
    }

    pub fn remove(&self, path: &str) {
        fs::remove_file(self.path().join(path)).unwrap();
    }

    pub fn rename(&self, from: &str, to: &str) {
        let target = self.path().join(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::rename(self.path().join(from), target).unwrap();
    }

    /// Stage everything and commit on `HEAD` as `author <author@example.com>`.
    pub fn commit(&self, author: &str, timestamp: i64, message: &str) -> Oid {
        let parents: Vec<Oid> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .map(|c| vec![c.id()])
            .unwrap_or_default();
        self.commit_with(author, timestamp, message, &parents, true)
    }

    /// Stage everything and commit with explicit parents, optionally
    /// leaving `HEAD` where it is.
    pub fn commit_with(
        &self,
        author: &str,
        timestamp: i64,
        message: &str,
        parents: &[Oid],
        update_head: bool,
    ) -> Oid {
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let email = format!("{author}@example.com");
        let sig = Signature::new(author, &email, &Time::new(timestamp, 0)).unwrap();
        let parent_commits: Vec<git2::Commit<'_>> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).unwrap())
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        self.repo
            .commit(
                update_head.then_some("HEAD"),
                &sig,
                &sig,
                message,
                &tree,
                &parent_refs,
            )
            .unwrap()
    }
}

pub fn lines(prefix: &str, count: usize) -> String {
    (1..=count).map(|i| format!("{prefix} line {i}\n")).collect()
}

/// Unix timestamp of `date` (YYYY-MM-DD) at midnight UTC plus `hours`.
pub fn at(date: &str, hours: i64) -> i64 {
    DateRange::parse(date, date).unwrap().start_timestamp() + hours * 3600
}

pub fn january() -> DateRange {
    DateRange::parse("2025-01-01", "2025-02-01").unwrap()
}
