//! Git history analytics: hotspots, ownership, contributors, heatmaps, and
//! co-change coupling.
//!
//! Every query follows the same path: a [`mining::CommitReader`] streams the
//! commits of one date window, an [`index::IndexBuilder`] folds them into an
//! immutable [`index::ChangeIndex`], and one stateless metric computer
//! reduces the index into a result list. [`query::Engine`] wires the three
//! together and is what front ends talk to.

pub mod contributors;
pub mod coupling;
pub mod dashboard;
pub mod exclude;
pub mod heatmap;
pub mod hotspots;
pub mod index;
pub mod mining;
pub mod ownership;
pub mod query;
pub mod repo_info;
pub mod temporal;

pub use query::{Engine, MetricKind, QueryRequest, QueryResult};
