//! Query facade: validate, stream, index, compute.
//!
//! Each call opens the repository, runs the commit reader on a scoped
//! producer thread, and folds commits into an index (or running totals for
//! the dashboard) on the calling thread. The two sides talk over a bounded
//! channel, so a slow consumer throttles the walk instead of buffering the
//! whole history.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use crossbeam_channel::bounded;
use serde::Serialize;
use strata_core::{AnalysisConfig, Cancellation, DateRange, StrataError};
use tracing::{debug, info};

use crate::contributors::{aggregate_contributors, Contributor};
use crate::coupling::{detect_coupling, CoChangePair, CouplingOptions};
use crate::dashboard::{DashboardBuilder, DashboardStats};
use crate::exclude::ExcludeSet;
use crate::heatmap::{commit_heatmap, commits_by_hour, HeatmapDay, HourBucket};
use crate::hotspots::{rank_hotspots, FileHotspot};
use crate::index::{ChangeIndex, IndexBuilder};
use crate::mining::{CommitInfo, CommitReader, MiningOptions};
use crate::ownership::{analyze_ownership, FileOwnership};
use crate::repo_info::{read_repo_info, RepoInfo};
use crate::temporal::{score_temporal_hotspots, TemporalHotspot};

/// Which metric a query asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKind {
    /// Repository name, branch and `HEAD` commit.
    RepoInfo,
    /// Window-wide totals.
    Dashboard,
    /// Files ranked by churn.
    Hotspots,
    /// Files ranked by recency-weighted churn.
    TemporalHotspots,
    /// Per-file top owners.
    Ownership,
    /// Author leaderboard.
    Contributors,
    /// Files that change together.
    CoChanges {
        /// Keep only the strongest `limit` pairs.
        limit: Option<usize>,
    },
    /// Commits per calendar day.
    Heatmap {
        /// Count only this author email.
        author: Option<String>,
    },
    /// Commits per hour of day.
    CommitsByHour {
        /// Count only this author email.
        author: Option<String>,
    },
}

impl MetricKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::RepoInfo => "repo_info",
            MetricKind::Dashboard => "dashboard",
            MetricKind::Hotspots => "hotspots",
            MetricKind::TemporalHotspots => "temporal_hotspots",
            MetricKind::Ownership => "ownership",
            MetricKind::Contributors => "contributors",
            MetricKind::CoChanges { .. } => "co_changes",
            MetricKind::Heatmap { .. } => "heatmap",
            MetricKind::CommitsByHour { .. } => "commits_by_hour",
        }
    }
}

/// One analytics request.
///
/// # Examples
///
/// ```
/// use strata_core::DateRange;
/// use strata_engine::{MetricKind, QueryRequest};
///
/// let range = DateRange::parse("2025-01-01", "2025-07-01").unwrap();
/// let request = QueryRequest::new(".", range, MetricKind::Hotspots)
///     .with_exclude(vec!["*.lock".into()]);
/// assert_eq!(request.exclude, vec!["*.lock".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Path to the repository (work tree or `.git` directory).
    pub repo: PathBuf,
    /// Author-time window `[from, to)`.
    pub range: DateRange,
    /// Exclude patterns, applied after the configured ones.
    pub exclude: Vec<String>,
    /// What to compute.
    pub metric: MetricKind,
}

impl QueryRequest {
    /// A request with no extra exclude patterns.
    pub fn new(repo: impl Into<PathBuf>, range: DateRange, metric: MetricKind) -> Self {
        Self {
            repo: repo.into(),
            range,
            exclude: Vec::new(),
            metric,
        }
    }

    /// Replace the request's exclude patterns.
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }
}

/// The answer to a [`QueryRequest`], one variant per response shape.
///
/// Serializes as the bare payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    RepoInfo(RepoInfo),
    Dashboard(DashboardStats),
    Hotspots(Vec<FileHotspot>),
    TemporalHotspots(Vec<TemporalHotspot>),
    Ownership(Vec<FileOwnership>),
    Contributors(Vec<Contributor>),
    CoChanges(Vec<CoChangePair>),
    Heatmap(Vec<HeatmapDay>),
    CommitsByHour(Vec<HourBucket>),
}

impl QueryResult {
    /// Number of rows in a list-shaped result; 1 for the single-record ones.
    pub fn len(&self) -> usize {
        match self {
            QueryResult::RepoInfo(_) | QueryResult::Dashboard(_) => 1,
            QueryResult::Hotspots(v) => v.len(),
            QueryResult::TemporalHotspots(v) => v.len(),
            QueryResult::Ownership(v) => v.len(),
            QueryResult::Contributors(v) => v.len(),
            QueryResult::CoChanges(v) => v.len(),
            QueryResult::Heatmap(v) => v.len(),
            QueryResult::CommitsByHour(v) => v.len(),
        }
    }

    /// Whether a list-shaped result is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The analytics engine.
///
/// Holds only immutable tuning, so one engine can serve concurrent queries
/// from several threads.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use strata_core::{AnalysisConfig, Cancellation, DateRange};
/// use strata_engine::Engine;
///
/// let engine = Engine::new(AnalysisConfig::default()).unwrap();
/// let range = DateRange::parse("2025-01-01", "2025-07-01").unwrap();
/// let hotspots = engine
///     .hotspots(Path::new("."), range, &[], &Cancellation::new())
///     .unwrap();
/// for h in hotspots.iter().take(5) {
///     println!("{}: {} lines over {} commits", h.path, h.lines_changed, h.commits);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    config: AnalysisConfig,
}

impl Engine {
    /// Create an engine after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Config`] if a tuning value is out of range.
    pub fn new(config: AnalysisConfig) -> Result<Self, StrataError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The tuning this engine runs with.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run one query.
    ///
    /// Exclude patterns are validated before the repository is opened, and
    /// the repository is opened before any history is read. A fired
    /// `cancel` yields [`StrataError::Cancelled`] and discards all partial
    /// work.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn run(
        &self,
        request: &QueryRequest,
        cancel: &Cancellation,
    ) -> Result<QueryResult, StrataError> {
        let started = Instant::now();
        let repo = request.repo.as_path();
        let range = request.range;
        let exclude = &request.exclude;

        let result = match &request.metric {
            MetricKind::RepoInfo => QueryResult::RepoInfo(self.repo_info(repo)?),
            MetricKind::Dashboard => {
                QueryResult::Dashboard(self.dashboard(repo, range, exclude, cancel)?)
            }
            MetricKind::Hotspots => {
                QueryResult::Hotspots(self.hotspots(repo, range, exclude, cancel)?)
            }
            MetricKind::TemporalHotspots => QueryResult::TemporalHotspots(
                self.temporal_hotspots(repo, range, exclude, cancel)?,
            ),
            MetricKind::Ownership => {
                QueryResult::Ownership(self.ownership(repo, range, exclude, cancel)?)
            }
            MetricKind::Contributors => {
                QueryResult::Contributors(self.contributors(repo, range, exclude, cancel)?)
            }
            MetricKind::CoChanges { limit } => {
                QueryResult::CoChanges(self.co_changes(repo, range, exclude, *limit, cancel)?)
            }
            MetricKind::Heatmap { author } => QueryResult::Heatmap(self.commit_heatmap(
                repo,
                range,
                exclude,
                author.as_deref(),
                cancel,
            )?),
            MetricKind::CommitsByHour { author } => QueryResult::CommitsByHour(
                self.commits_by_hour(repo, range, exclude, author.as_deref(), cancel)?,
            ),
        };

        info!(
            metric = request.metric.name(),
            range = %range,
            rows = result.len(),
            empty = result.is_empty(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query finished"
        );
        Ok(result)
    }

    /// Name, branch and `HEAD` commit of the repository.
    ///
    /// # Errors
    ///
    /// [`StrataError::RepositoryUnavailable`] or
    /// [`StrataError::HistoryReadError`].
    pub fn repo_info(&self, repo: &Path) -> Result<RepoInfo, StrataError> {
        let reader = self.open(repo)?;
        read_repo_info(&reader, chrono::Utc::now().timestamp())
    }

    /// Window-wide totals from a single pass, without building an index.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn dashboard(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        cancel: &Cancellation,
    ) -> Result<DashboardStats, StrataError> {
        let exclude = self.exclude_set(exclude)?;
        let reader = self.open(repo)?;
        let mut builder = DashboardBuilder::new(exclude);
        self.pump(reader, range, cancel, |commit| builder.push(&commit))?;
        Ok(builder.finish())
    }

    /// Files ranked by lines changed.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn hotspots(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        cancel: &Cancellation,
    ) -> Result<Vec<FileHotspot>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        Ok(rank_hotspots(&index))
    }

    /// Files ranked by churn decayed from the end of `range`.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn temporal_hotspots(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        cancel: &Cancellation,
    ) -> Result<Vec<TemporalHotspot>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        score_temporal_hotspots(&index, &range, self.config.half_life_days)
    }

    /// Top two owners of every file.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn ownership(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        cancel: &Cancellation,
    ) -> Result<Vec<FileOwnership>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        Ok(analyze_ownership(&index))
    }

    /// Author leaderboard.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn contributors(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        cancel: &Cancellation,
    ) -> Result<Vec<Contributor>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        Ok(aggregate_contributors(&index))
    }

    /// File pairs that change together, strongest first.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn co_changes(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        limit: Option<usize>,
        cancel: &Cancellation,
    ) -> Result<Vec<CoChangePair>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        let options = CouplingOptions::from_config(&self.config, limit);
        Ok(detect_coupling(&index, &options))
    }

    /// Commits per day in `range`, optionally for one author email.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn commit_heatmap(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        author: Option<&str>,
        cancel: &Cancellation,
    ) -> Result<Vec<HeatmapDay>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        Ok(commit_heatmap(&index, &range, author))
    }

    /// Commits per UTC hour of day, optionally for one author email.
    ///
    /// # Errors
    ///
    /// Any [`StrataError`] from the query taxonomy.
    pub fn commits_by_hour(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        author: Option<&str>,
        cancel: &Cancellation,
    ) -> Result<Vec<HourBucket>, StrataError> {
        let index = self.index(repo, range, exclude, cancel)?;
        Ok(commits_by_hour(&index, author))
    }

    fn exclude_set(&self, extra: &[String]) -> Result<ExcludeSet, StrataError> {
        let patterns: Vec<String> = self
            .config
            .exclude
            .iter()
            .chain(extra)
            .cloned()
            .collect();
        ExcludeSet::new(&patterns)
    }

    fn open(&self, repo: &Path) -> Result<CommitReader, StrataError> {
        CommitReader::open(repo, MiningOptions::from_config(&self.config))
    }

    fn index(
        &self,
        repo: &Path,
        range: DateRange,
        exclude: &[String],
        cancel: &Cancellation,
    ) -> Result<ChangeIndex, StrataError> {
        let exclude = self.exclude_set(exclude)?;
        let reader = self.open(repo)?;
        let mut builder = IndexBuilder::new(exclude);
        self.pump(reader, range, cancel, |commit| builder.push(commit))?;
        let index = builder.finish();
        cancel.check()?;
        if index.is_empty() {
            debug!(range = %range, "no commits in window");
        }
        Ok(index)
    }

    /// Stream the window's commits through `sink` on the calling thread
    /// while the reader walks history on a scoped producer thread.
    fn pump<F>(
        &self,
        reader: CommitReader,
        range: DateRange,
        cancel: &Cancellation,
        mut sink: F,
    ) -> Result<usize, StrataError>
    where
        F: FnMut(CommitInfo),
    {
        cancel.check()?;
        let (tx, rx) = bounded::<Result<CommitInfo, StrataError>>(self.config.channel_capacity);

        thread::scope(|scope| -> Result<usize, StrataError> {
            let producer = scope.spawn(move || -> Result<(), StrataError> {
                let stream = reader.commits(Some(range), cancel)?;
                for item in stream {
                    let failed = item.is_err();
                    // a closed channel means the consumer gave up
                    if tx.send(item).is_err() || failed {
                        break;
                    }
                }
                Ok(())
            });

            let mut received = 0usize;
            let mut outcome = Ok(());
            for item in rx.iter() {
                match item {
                    Ok(commit) => {
                        sink(commit);
                        received += 1;
                        if cancel.is_cancelled() {
                            outcome = Err(StrataError::Cancelled);
                            break;
                        }
                    }
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }
            drop(rx);

            let produced = producer.join().map_err(|_| {
                StrataError::HistoryReadError("commit reader thread panicked".into())
            })?;
            outcome?;
            produced?;
            debug!(commits = received, range = %range, "history streamed");
            Ok(received)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;

    fn range() -> DateRange {
        DateRange::parse("2025-01-01", "2025-02-01").unwrap()
    }

    fn engine() -> Engine {
        Engine::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AnalysisConfig {
            channel_capacity: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(Engine::new(config), Err(StrataError::Config(_))));
    }

    #[test]
    fn patterns_are_checked_before_the_repository() {
        let dir = tempfile::tempdir().unwrap();
        let request = QueryRequest::new(dir.path(), range(), MetricKind::Hotspots)
            .with_exclude(vec!["src/[".into()]);
        let err = engine().run(&request, &Cancellation::new()).unwrap_err();
        assert!(matches!(err, StrataError::InvalidPattern { .. }), "{err:?}");
    }

    #[test]
    fn configured_patterns_are_validated_too() {
        let config = AnalysisConfig {
            exclude: vec!["[".into()],
            ..AnalysisConfig::default()
        };
        let engine = Engine::new(config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = engine
            .hotspots(dir.path(), range(), &[], &Cancellation::new())
            .unwrap_err();
        assert!(matches!(err, StrataError::InvalidPattern { .. }));
    }

    #[test]
    fn plain_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let request = QueryRequest::new(dir.path(), range(), MetricKind::Dashboard);
        let err = engine().run(&request, &Cancellation::new()).unwrap_err();
        assert!(matches!(err, StrataError::RepositoryUnavailable { .. }));
    }

    #[test]
    fn empty_repository_gives_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let engine = engine();
        let cancel = Cancellation::new();

        assert!(engine.hotspots(dir.path(), range(), &[], &cancel).unwrap().is_empty());
        assert_eq!(
            engine.dashboard(dir.path(), range(), &[], &cancel).unwrap(),
            DashboardStats::default()
        );
        let days = engine
            .commit_heatmap(dir.path(), range(), &[], None, &cancel)
            .unwrap();
        assert_eq!(days.len(), 31);
        assert!(days.iter().all(|d| d.count == 0));
    }

    #[test]
    fn cancelled_token_stops_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();

        let request = QueryRequest::new(dir.path(), range(), MetricKind::Contributors);
        let err = engine().run(&request, &cancel).unwrap_err();
        assert!(err.is_cancelled());
    }

    fn commit_chain(count: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut parent: Option<git2::Oid> = None;
        for i in 0..count {
            std::fs::write(dir.path().join("a.txt"), format!("{i}\n")).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("a.txt")).unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let time = range().start_timestamp() + i as i64 * 3600;
            let sig = git2::Signature::new("a", "a@example.com", &git2::Time::new(time, 0)).unwrap();
            let parents: Vec<git2::Commit<'_>> =
                parent.iter().map(|p| repo.find_commit(*p).unwrap()).collect();
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
            parent = Some(
                repo.commit(Some("HEAD"), &sig, &sig, "step", &tree, &parent_refs)
                    .unwrap(),
            );
        }
        dir
    }

    #[test]
    fn cancelling_inside_the_consumer_stops_the_stream() {
        let dir = commit_chain(20);
        let engine = Engine::new(AnalysisConfig {
            channel_capacity: 1,
            ..AnalysisConfig::default()
        })
        .unwrap();
        let reader = engine.open(dir.path()).unwrap();
        let cancel = Cancellation::new();

        let mut seen = 0;
        let result = engine.pump(reader, range(), &cancel, |_| {
            seen += 1;
            if seen == 3 {
                cancel.cancel();
            }
        });
        assert!(matches!(result, Err(StrataError::Cancelled)), "{result:?}");
        assert_eq!(seen, 3);
    }

    #[test]
    fn uncancelled_pump_sees_every_commit() {
        let dir = commit_chain(5);
        let engine = engine();
        let reader = engine.open(dir.path()).unwrap();
        let mut seen = 0;
        let received = engine
            .pump(reader, range(), &Cancellation::new(), |_| seen += 1)
            .unwrap();
        assert_eq!(received, 5);
        assert_eq!(seen, 5);
    }

    #[test]
    fn metric_names_are_stable() {
        assert_eq!(MetricKind::CoChanges { limit: None }.name(), "co_changes");
        assert_eq!(MetricKind::Heatmap { author: None }.name(), "heatmap");
    }

    #[test]
    fn results_serialize_as_bare_payload() {
        let result = QueryResult::CommitsByHour(vec![HourBucket { hour: 3, count: 2 }]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json[0]["hour"], 3);
        assert_eq!(result.len(), 1);
        assert!(!result.is_empty());
        assert!(QueryResult::Hotspots(Vec::new()).is_empty());
    }
}
