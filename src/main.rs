use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::{Cancellation, DateRange, OutputFormat, StrataConfig};
use strata_engine::{Engine, MetricKind, QueryRequest, QueryResult};

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Git history analytics",
    long_about = "Strata mines a local git repository and reports where the work happens.\n\n\
                   One subcommand per metric, each over a date window and an optional\n\
                   set of exclude patterns.\n\n\
                   Examples:\n  \
                     strata info                          Repository name, branch and HEAD\n  \
                     strata hotspots --preset 90d         Files with the most churn\n  \
                     strata temporal                      Churn weighted by recency\n  \
                     strata ownership -x '*.lock'         Who owns which file\n  \
                     strata coupling --limit 10           Files that change together\n  \
                     strata heatmap --from 2025-01-01 --to 2025-04-01"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .strata.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables (default)\n  \
                         json      Machine-readable JSON with snake_case keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
enum Preset {
    /// Last 30 days
    #[value(name = "30d")]
    Days30,
    /// Last 90 days
    #[value(name = "90d")]
    Days90,
    /// Last 182 days
    #[value(name = "6mo")]
    Months6,
    /// Last 365 days
    #[value(name = "1yr")]
    Year1,
    /// Everything since 1970-01-01
    #[value(name = "all")]
    All,
}

impl Preset {
    fn days(self) -> Option<u64> {
        match self {
            Preset::Days30 => Some(30),
            Preset::Days90 => Some(90),
            Preset::Months6 => Some(182),
            Preset::Year1 => Some(365),
            Preset::All => None,
        }
    }
}

#[derive(Args, Clone)]
struct RepoArgs {
    /// Repository path (default: current directory)
    #[arg(long, default_value = ".")]
    repo: PathBuf,
}

#[derive(Args, Clone)]
struct WindowArgs {
    #[command(flatten)]
    repo: RepoArgs,

    /// Window preset, ending tomorrow (exclusive)
    #[arg(long, value_enum, default_value = "6mo")]
    preset: Preset,

    /// First day of the window, YYYY-MM-DD (overrides --preset)
    #[arg(long)]
    from: Option<String>,

    /// Day after the window, YYYY-MM-DD, exclusive (default: tomorrow)
    #[arg(long)]
    to: Option<String>,

    /// Exclude paths matching a glob or substring (repeatable, added to config)
    #[arg(long, short = 'x')]
    exclude: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Show repository name, branch, and the HEAD commit
    Info {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Show commit, contributor, and line totals for a window
    Stats {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Rank files by lines changed
    Hotspots {
        #[command(flatten)]
        window: WindowArgs,
        /// Maximum rows to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Rank files by churn decayed with the age of their last change
    #[command(long_about = "Rank files by churn decayed with the age of their last change.\n\n\
        score = lines_changed / (1 + days_since / half_life), measured from the end of\n\
        the window. The half-life comes from [analysis].half_life_days (default 30).")]
    Temporal {
        #[command(flatten)]
        window: WindowArgs,
        /// Maximum rows to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show the top two owners of each file by net lines
    Ownership {
        #[command(flatten)]
        window: WindowArgs,
        /// Maximum rows to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Rank authors by commits
    Contributors {
        #[command(flatten)]
        window: WindowArgs,
        /// Maximum rows to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Find files that change together
    #[command(long_about = "Find files that change together.\n\n\
        Commits touching more than [analysis].max_files_per_commit files add no pairs.\n\
        Pairs seen fewer than [analysis].min_co_changes times are dropped.")]
    Coupling {
        #[command(flatten)]
        window: WindowArgs,
        /// Maximum pairs to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Commits per day across the window
    Heatmap {
        #[command(flatten)]
        window: WindowArgs,
        /// Count only commits by this author email
        #[arg(long)]
        author: Option<String>,
    },
    /// Commits per hour of day (UTC)
    Hours {
        #[command(flatten)]
        window: WindowArgs,
        /// Count only commits by this author email
        #[arg(long)]
        author: Option<String>,
    },
    /// Create a default .strata.toml configuration file
    #[command(long_about = "Create a default .strata.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .strata.toml already exists.")]
    Init,
}

const DEFAULT_CONFIG: &str = r#"# Strata Configuration

[analysis]
# Days for a file's churn weight to halve in `strata temporal`
# half_life_days = 30.0

# Commits touching more files than this add no co-change pairs
# max_files_per_commit = 50

# Minimum times a pair must change together to be reported
# min_co_changes = 2

# Similarity percentage for git to treat delete + add as a rename
# rename_similarity = 50

# Commits buffered between the history reader and the indexer
# channel_capacity = 256

# Walk this branch instead of HEAD
# branch = "main"

# Paths left out of every metric (globs, or plain substrings)
# exclude = ["*.lock", "vendor/", "*.min.js"]
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<StrataConfig> {
    let config = match path {
        Some(path) => StrataConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".strata.toml");
            if default_path.exists() {
                StrataConfig::from_file(default_path)?
            } else {
                StrataConfig::default()
            }
        }
    };
    Ok(config)
}

/// Resolve the window flags against `today`.
///
/// Presets run from `today - days` to tomorrow. Explicit `--from`/`--to`
/// replace either end.
fn resolve_range(window: &WindowArgs, today: NaiveDate) -> Result<DateRange> {
    let tomorrow = today.succ_opt().unwrap_or(today);
    let preset_start = match window.preset.days() {
        Some(days) => today
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN),
        None => DateTime::UNIX_EPOCH.date_naive(),
    };

    let from = window
        .from
        .clone()
        .unwrap_or_else(|| preset_start.format("%Y-%m-%d").to_string());
    let to = window
        .to
        .clone()
        .unwrap_or_else(|| tomorrow.format("%Y-%m-%d").to_string());
    Ok(DateRange::parse(&from, &to)?)
}

fn run_query(engine: &Engine, request: QueryRequest) -> Result<QueryResult> {
    let is_tty = std::io::stderr().is_terminal();
    let spinner = if is_tty {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
        {
            pb.set_style(style);
        }
        pb.set_message(format!(
            "Reading history of {} ({})...",
            request.repo.display(),
            request.range
        ));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = engine.run(&request, &Cancellation::new());
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(result?)
}

fn window_request(window: &WindowArgs, metric: MetricKind) -> Result<QueryRequest> {
    let range = resolve_range(window, Utc::now().date_naive())?;
    Ok(QueryRequest::new(&window.repo.repo, range, metric).with_exclude(window.exclude.clone()))
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Init = cli.command {
        let path = Path::new(".strata.toml");
        if path.exists() {
            miette::bail!(".strata.toml already exists");
        }
        std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
        println!("Created .strata.toml with default configuration");
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let engine = Engine::new(config.analysis)?;
    tracing::debug!(format = %cli.format, "configuration loaded");

    let (request, limit) = match &cli.command {
        Command::Info { repo } => {
            let range = DateRange::new(Utc::now().date_naive(), Utc::now().date_naive())?;
            (QueryRequest::new(&repo.repo, range, MetricKind::RepoInfo), None)
        }
        Command::Stats { window } => (window_request(window, MetricKind::Dashboard)?, None),
        Command::Hotspots { window, limit } => {
            (window_request(window, MetricKind::Hotspots)?, Some(*limit))
        }
        Command::Temporal { window, limit } => {
            (window_request(window, MetricKind::TemporalHotspots)?, Some(*limit))
        }
        Command::Ownership { window, limit } => {
            (window_request(window, MetricKind::Ownership)?, Some(*limit))
        }
        Command::Contributors { window, limit } => {
            (window_request(window, MetricKind::Contributors)?, Some(*limit))
        }
        Command::Coupling { window, limit } => (
            window_request(
                window,
                MetricKind::CoChanges {
                    limit: Some(*limit),
                },
            )?,
            Some(*limit),
        ),
        Command::Heatmap { window, author } => (
            window_request(
                window,
                MetricKind::Heatmap {
                    author: author.clone(),
                },
            )?,
            None,
        ),
        Command::Hours { window, author } => (
            window_request(
                window,
                MetricKind::CommitsByHour {
                    author: author.clone(),
                },
            )?,
            None,
        ),
        Command::Init => return Ok(()),
    };

    let heading = match &request.metric {
        MetricKind::RepoInfo => None,
        _ => Some(request.range),
    };
    let result = run_query(&engine, request)?;
    print!("{}", render(&result, cli.format, limit, heading)?);
    Ok(())
}

fn render(
    result: &QueryResult,
    format: OutputFormat,
    limit: Option<usize>,
    range: Option<DateRange>,
) -> Result<String> {
    let take = limit.unwrap_or(usize::MAX);

    if format == OutputFormat::Json {
        let value = match result {
            QueryResult::Hotspots(v) => serde_json::to_value(&v[..take.min(v.len())]),
            QueryResult::TemporalHotspots(v) => serde_json::to_value(&v[..take.min(v.len())]),
            QueryResult::Ownership(v) => serde_json::to_value(&v[..take.min(v.len())]),
            QueryResult::Contributors(v) => serde_json::to_value(&v[..take.min(v.len())]),
            QueryResult::CoChanges(v) => serde_json::to_value(&v[..take.min(v.len())]),
            other => serde_json::to_value(other),
        }
        .into_diagnostic()?;
        return Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&value).into_diagnostic()?
        ));
    }

    let title = |name: &str| match range {
        Some(range) => format!("{name} ({range})"),
        None => name.to_string(),
    };

    let out = match result {
        QueryResult::RepoInfo(info) => fields(
            format,
            &title("Repository"),
            &[
                ("name", info.name.clone()),
                ("branch", info.branch.clone()),
                ("head", info.head_hash.clone()),
                ("author", format_author(&info.last_author, &info.last_email)),
                ("message", info.last_message.clone()),
                ("age", info.last_commit_age.clone()),
            ],
        ),
        QueryResult::Dashboard(stats) => fields(
            format,
            &title("Summary"),
            &[
                ("commits", stats.commits.to_string()),
                ("contributors", stats.contributors.to_string()),
                ("additions", stats.additions.to_string()),
                ("deletions", stats.deletions.to_string()),
                ("files changed", stats.files_changed.to_string()),
            ],
        ),
        QueryResult::Hotspots(rows) => table(
            format,
            &title("Hotspots"),
            &["#", "File", "Lines", "+", "-", "Commits"],
            rows.iter()
                .take(take)
                .enumerate()
                .map(|(i, h)| {
                    vec![
                        (i + 1).to_string(),
                        code(format, &h.path),
                        h.lines_changed.to_string(),
                        h.additions.to_string(),
                        h.deletions.to_string(),
                        h.commits.to_string(),
                    ]
                })
                .collect(),
        ),
        QueryResult::TemporalHotspots(rows) => table(
            format,
            &title("Temporal hotspots"),
            &["#", "File", "Score", "Lines", "Commits", "Last changed", "Days"],
            rows.iter()
                .take(take)
                .enumerate()
                .map(|(i, t)| {
                    vec![
                        (i + 1).to_string(),
                        code(format, &t.path),
                        format!("{:.1}", t.score),
                        t.lines_changed.to_string(),
                        t.commits.to_string(),
                        t.last_changed.clone(),
                        t.days_since.to_string(),
                    ]
                })
                .collect(),
        ),
        QueryResult::Ownership(rows) => table(
            format,
            &title("Ownership"),
            &["File", "Top author", "Share", "Runner-up", "Share", "Authors", "Lines"],
            rows.iter()
                .take(take)
                .map(|o| {
                    vec![
                        code(format, &o.path),
                        o.top_author_name.clone(),
                        percent(o.top_author_pct),
                        o.second_author_name.clone(),
                        if o.second_author_email.is_empty() {
                            String::new()
                        } else {
                            percent(o.second_author_pct)
                        },
                        o.contributor_count.to_string(),
                        o.total_lines.to_string(),
                    ]
                })
                .collect(),
        ),
        QueryResult::Contributors(rows) => table(
            format,
            &title("Contributors"),
            &["#", "Author", "Commits", "+", "-"],
            rows.iter()
                .take(take)
                .enumerate()
                .map(|(i, c)| {
                    vec![
                        (i + 1).to_string(),
                        format_author(&c.author_name, &c.author_email),
                        c.commits.to_string(),
                        c.additions.to_string(),
                        c.deletions.to_string(),
                    ]
                })
                .collect(),
        ),
        QueryResult::CoChanges(rows) => table(
            format,
            &title("Co-changes"),
            &["File A", "File B", "Together", "A", "B", "Ratio"],
            rows.iter()
                .take(take)
                .map(|p| {
                    vec![
                        code(format, &p.file_a),
                        code(format, &p.file_b),
                        p.co_change_count.to_string(),
                        p.commits_a.to_string(),
                        p.commits_b.to_string(),
                        format!("{:.2}", p.coupling_ratio),
                    ]
                })
                .collect(),
        ),
        QueryResult::Heatmap(days) => {
            let max = days.iter().map(|d| d.count).max().unwrap_or(0);
            table(
                format,
                &title("Commits per day"),
                &["Date", "Commits", ""],
                days.iter()
                    .map(|d| vec![d.date.clone(), d.count.to_string(), bar(d.count, max)])
                    .collect(),
            )
        }
        QueryResult::CommitsByHour(hours) => {
            let max = hours.iter().map(|h| h.count).max().unwrap_or(0);
            table(
                format,
                &title("Commits per hour (UTC)"),
                &["Hour", "Commits", ""],
                hours
                    .iter()
                    .map(|h| {
                        vec![
                            format!("{:02}:00", h.hour),
                            h.count.to_string(),
                            bar(h.count, max),
                        ]
                    })
                    .collect(),
            )
        }
    };
    Ok(out)
}

fn format_author(name: &str, email: &str) -> String {
    if email.is_empty() {
        name.to_string()
    } else {
        format!("{name} <{email}>")
    }
}

fn percent(share: f64) -> String {
    format!("{:.0}%", share * 100.0)
}

fn code(format: OutputFormat, path: &str) -> String {
    match format {
        OutputFormat::Markdown => format!("`{path}`"),
        _ => path.to_string(),
    }
}

fn bar(count: u32, max: u32) -> String {
    const WIDTH: u64 = 40;
    if max == 0 || count == 0 {
        return String::new();
    }
    let len = (u64::from(count) * WIDTH).div_ceil(u64::from(max)).max(1);
    "#".repeat(len as usize)
}

fn fields(format: OutputFormat, title: &str, pairs: &[(&str, String)]) -> String {
    let mut out = String::new();
    match format {
        OutputFormat::Markdown => {
            out.push_str(&format!("# {title}\n\n"));
            for (key, value) in pairs {
                out.push_str(&format!("- **{key}:** {value}\n"));
            }
        }
        _ => {
            let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
            for (key, value) in pairs {
                out.push_str(&format!("{key:<width$}  {value}\n"));
            }
        }
    }
    out
}

fn table(format: OutputFormat, title: &str, headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut out = String::new();
    if format == OutputFormat::Markdown {
        out.push_str(&format!("# {title}\n\n"));
        if rows.is_empty() {
            out.push_str("Nothing to report.\n");
            return out;
        }
        out.push_str(&format!("| {} |\n", headers.join(" | ")));
        out.push_str(&format!(
            "|{}|\n",
            headers.iter().map(|_| "---").collect::<Vec<_>>().join("|")
        ));
        for row in &rows {
            out.push_str(&format!("| {} |\n", row.join(" | ")));
        }
        return out;
    }

    out.push_str(&format!("{title}\n\n"));
    if rows.is_empty() {
        out.push_str("Nothing to report.\n");
        return out;
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    out.push_str(&pad_row(headers, &widths));
    out.push('\n');
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&pad_row(&cells, &widths));
        out.push('\n');
    }
    out
}

fn pad_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
