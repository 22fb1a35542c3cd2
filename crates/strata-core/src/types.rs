use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::StrataError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A half-open UTC calendar range `[from, to)`.
///
/// Construction is the validation point: a `DateRange` with `from > to`
/// cannot exist, so queries carrying one never touch the repository.
///
/// # Examples
///
/// ```
/// use strata_core::DateRange;
///
/// let range = DateRange::parse("2025-01-01", "2025-01-08").unwrap();
/// assert_eq!(range.day_count(), 7);
/// assert!(DateRange::parse("2025-02-01", "2025-01-01").is_err());
/// assert!(DateRange::parse("yesterday", "2025-01-01").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Build a range from two dates.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidRange`] if `from > to`. An empty range
    /// (`from == to`) is valid and matches nothing.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, StrataError> {
        if from > to {
            return Err(StrataError::InvalidRange(format!(
                "from {} is after to {}",
                from.format(DATE_FORMAT),
                to.format(DATE_FORMAT)
            )));
        }
        Ok(Self { from, to })
    }

    /// Parse a range from two ISO-8601 dates (`YYYY-MM-DD`).
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidRange`] for a malformed date or
    /// `from > to`.
    pub fn parse(from: &str, to: &str) -> Result<Self, StrataError> {
        Self::new(parse_date("from", from)?, parse_date("to", to)?)
    }

    /// Inclusive start date.
    pub fn from(&self) -> NaiveDate {
        self.from
    }

    /// Exclusive end date.
    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Unix timestamp of `from` at 00:00 UTC.
    pub fn start_timestamp(&self) -> i64 {
        midnight_utc(self.from)
    }

    /// Unix timestamp of `to` at 00:00 UTC (exclusive bound).
    pub fn end_timestamp(&self) -> i64 {
        midnight_utc(self.to)
    }

    /// Whether `timestamp` (unix seconds) falls inside `[from, to)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::DateRange;
    ///
    /// let range = DateRange::parse("2025-01-01", "2025-01-02").unwrap();
    /// assert!(range.contains(range.start_timestamp()));
    /// assert!(!range.contains(range.end_timestamp()));
    /// ```
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_timestamp() && timestamp < self.end_timestamp()
    }

    /// Every calendar day in the range, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take_while(move |d| *d < self.to)
    }

    /// Number of calendar days in the range.
    pub fn day_count(&self) -> usize {
        (self.to - self.from).num_days().max(0) as usize
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.from.format(DATE_FORMAT),
            self.to.format(DATE_FORMAT)
        )
    }
}

fn parse_date(label: &str, value: &str) -> Result<NaiveDate, StrataError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        StrataError::InvalidRange(format!("{label} date '{value}' is not YYYY-MM-DD: {e}"))
    })
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Output format for command results.
///
/// # Examples
///
/// ```
/// use strata_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Caller-owned cancellation signal shared by clones.
///
/// The engine checks it at every commit boundary.
///
/// # Examples
///
/// ```
/// use strata_core::Cancellation;
///
/// let cancel = Cancellation::new();
/// let handle = cancel.clone();
/// assert!(cancel.check().is_ok());
/// handle.cancel();
/// assert!(cancel.is_cancelled());
/// assert!(cancel.check().unwrap_err().is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// A fresh, un-fired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the signal has fired.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Cancelled`] after [`Cancellation::cancel`].
    pub fn check(&self) -> Result<(), StrataError> {
        if self.is_cancelled() {
            Err(StrataError::Cancelled)
        } else {
            Ok(())
        }
    }
}
