//! Core types, configuration, and error handling for Strata.
//!
//! This crate provides the shared foundation used by the engine and the CLI:
//! - [`StrataError`], the error type shared by every crate
//! - [`StrataConfig`], loaded from `.strata.toml`
//! - Shared types: [`DateRange`], [`OutputFormat`], [`Cancellation`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, StrataConfig};
pub use error::StrataError;
pub use types::{Cancellation, DateRange, OutputFormat};

/// A convenience `Result` type for Strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
