//! Exclude-pattern matching for repository-relative paths.
//!
//! Two rule shapes share one list: a pattern containing any of `*`, `?` or
//! `[` is a shell glob matched against the whole path (with `*` free to
//! cross `/`), anything else is a plain substring. Matching is
//! case-sensitive.

use glob::{MatchOptions, Pattern};
use strata_core::StrataError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
enum Rule {
    Glob(Pattern),
    Substring(String),
}

/// A validated set of exclude patterns.
///
/// # Examples
///
/// ```
/// use strata_engine::exclude::ExcludeSet;
///
/// let set = ExcludeSet::new(&["*.lock".to_string(), "vendor/".to_string()]).unwrap();
/// assert!(set.is_excluded("Cargo.lock"));
/// assert!(set.is_excluded("third_party/vendor/lib.c"));
/// assert!(!set.is_excluded("src/main.rs"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    rules: Vec<Rule>,
}

impl ExcludeSet {
    /// Compile every pattern up front.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidPattern`] for the first pattern that is
    /// empty or not a valid glob. Nothing is silently dropped.
    pub fn new(patterns: &[String]) -> Result<Self, StrataError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for raw in patterns {
            if raw.trim().is_empty() {
                return Err(StrataError::InvalidPattern {
                    pattern: raw.clone(),
                    reason: "pattern is empty".into(),
                });
            }
            if raw.contains(['*', '?', '[']) {
                let pattern = Pattern::new(raw).map_err(|e| StrataError::InvalidPattern {
                    pattern: raw.clone(),
                    reason: e.msg.to_string(),
                })?;
                rules.push(Rule::Glob(pattern));
            } else {
                rules.push(Rule::Substring(raw.clone()));
            }
        }
        Ok(Self { rules })
    }

    /// Whether the set filters anything at all.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` matches any rule.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| match rule {
            Rule::Glob(pattern) => pattern.matches_with(path, MATCH_OPTIONS),
            Rule::Substring(needle) => path.contains(needle.as_str()),
        })
    }
}
