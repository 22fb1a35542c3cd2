use std::path::PathBuf;

/// Errors that can occur across the Strata engine.
///
/// The first five variants are the query taxonomy: they are what a caller of
/// the analytics engine needs to distinguish. The remaining variants cover
/// configuration loading and output. Library crates use this type directly;
/// the binary renders them through `miette`.
///
/// # Examples
///
/// ```
/// use strata_core::StrataError;
///
/// let err = StrataError::InvalidRange("from 2025-02-01 is after to 2025-01-01".into());
/// assert!(err.to_string().contains("2025-02-01"));
/// assert!(!err.is_cancelled());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum StrataError {
    /// The path is not a git repository, or it cannot be read.
    #[error("repository unavailable at {}: {reason}", .path.display())]
    #[diagnostic(help("run strata from inside a git repository, or pass --repo"))]
    RepositoryUnavailable {
        /// Path the caller asked for.
        path: PathBuf,
        /// Underlying reason reported by git.
        reason: String,
    },

    /// Malformed date or `from > to`. Raised before any I/O.
    #[error("invalid date range: {0}")]
    #[diagnostic(help("dates are YYYY-MM-DD and --from must not be after --to"))]
    InvalidRange(String),

    /// A malformed exclude pattern. The whole query is rejected.
    #[error("invalid exclude pattern '{pattern}': {reason}")]
    #[diagnostic(help("patterns with * ? or [ are globs; anything else matches as a substring"))]
    InvalidPattern {
        /// Pattern as supplied by the caller.
        pattern: String,
        /// Why it failed to compile.
        reason: String,
    },

    /// The caller's cancellation signal fired before the query finished.
    #[error("query cancelled")]
    Cancelled,

    /// Failure while walking or diffing history (corrupt object, truncated
    /// read). The query is aborted rather than returning partial history.
    #[error("failed to read history: {0}")]
    HistoryReadError(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check the [analysis] section of .strata.toml"))]
    Config(String),

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl StrataError {
    /// Whether this error is a clean cancellation rather than a failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::StrataError;
    ///
    /// assert!(StrataError::Cancelled.is_cancelled());
    /// assert!(!StrataError::HistoryReadError("bad object".into()).is_cancelled());
    /// ```
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StrataError::Cancelled)
    }

    /// Wrap a git failure that happened while streaming history.
    pub fn history(context: &str, err: impl std::fmt::Display) -> Self {
        StrataError::HistoryReadError(format!("{context}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StrataError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn repository_unavailable_shows_path() {
        let err = StrataError::RepositoryUnavailable {
            path: PathBuf::from("/tmp/not-a-repo"),
            reason: "could not find repository".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/not-a-repo"));
        assert!(msg.contains("could not find repository"));
    }

    #[test]
    fn invalid_pattern_names_the_pattern() {
        let err = StrataError::InvalidPattern {
            pattern: "src/[".into(),
            reason: "unclosed bracket".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid exclude pattern 'src/[': unclosed bracket"
        );
    }

    #[test]
    fn history_helper_keeps_context() {
        let err = StrataError::history("failed to find commit", "object not found");
        assert_eq!(
            err.to_string(),
            "failed to read history: failed to find commit: object not found"
        );
    }

    #[test]
    fn only_cancelled_is_cancelled() {
        assert!(StrataError::Cancelled.is_cancelled());
        assert!(!StrataError::Config("x".into()).is_cancelled());
        assert!(!StrataError::InvalidRange("x".into()).is_cancelled());
    }
}
