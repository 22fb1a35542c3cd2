use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// Top-level configuration loaded from `.strata.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use strata_core::StrataConfig;
///
/// let config = StrataConfig::default();
/// assert_eq!(config.analysis.half_life_days, 30.0);
/// assert_eq!(config.analysis.max_files_per_commit, 50);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// History analysis tuning.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl StrataConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Io`] if the file cannot be read,
    /// [`StrataError::Toml`] if the content is not valid TOML, or
    /// [`StrataError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use strata_core::StrataConfig;
    /// use std::path::Path;
    ///
    /// let config = StrataConfig::from_file(Path::new(".strata.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, StrataError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Toml`] if parsing fails, or
    /// [`StrataError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::StrataConfig;
    ///
    /// let toml = r#"
    /// [analysis]
    /// half_life_days = 14.0
    /// "#;
    /// let config = StrataConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.analysis.half_life_days, 14.0);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, StrataError> {
        let config: Self = toml::from_str(content)?;
        config.analysis.validate()?;
        Ok(config)
    }
}

/// Tunable constants for history analysis.
///
/// # Examples
///
/// ```
/// use strata_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.min_co_changes, 2);
/// assert_eq!(config.rename_similarity, 50);
/// assert!(config.branch.is_none());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Days after which a change's temporal weight halves (default: 30).
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    /// Commits touching more files than this are left out of co-change
    /// pairing (default: 50).
    #[serde(default = "default_max_files_per_commit")]
    pub max_files_per_commit: usize,
    /// Minimum shared commits for a co-change pair to be reported (default: 2).
    #[serde(default = "default_min_co_changes")]
    pub min_co_changes: u32,
    /// Similarity percentage above which git reports a rename (default: 50).
    #[serde(default = "default_rename_similarity")]
    pub rename_similarity: u16,
    /// Commits buffered between the history reader and the indexer
    /// (default: 256).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Branch to walk instead of `HEAD`.
    pub branch: Option<String>,
    /// Exclude patterns applied to every query in addition to the caller's.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_half_life_days() -> f64 {
    30.0
}

fn default_max_files_per_commit() -> usize {
    50
}

fn default_min_co_changes() -> u32 {
    2
}

fn default_rename_similarity() -> u16 {
    50
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            max_files_per_commit: default_max_files_per_commit(),
            min_co_changes: default_min_co_changes(),
            rename_similarity: default_rename_similarity(),
            channel_capacity: default_channel_capacity(),
            branch: None,
            exclude: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<(), StrataError> {
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(StrataError::Config(format!(
                "analysis.half_life_days must be a positive number, got {}",
                self.half_life_days
            )));
        }
        if self.min_co_changes == 0 {
            return Err(StrataError::Config(
                "analysis.min_co_changes must be at least 1".into(),
            ));
        }
        if self.rename_similarity > 100 {
            return Err(StrataError::Config(format!(
                "analysis.rename_similarity is a percentage, got {}",
                self.rename_similarity
            )));
        }
        if self.channel_capacity == 0 {
            return Err(StrataError::Config(
                "analysis.channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
