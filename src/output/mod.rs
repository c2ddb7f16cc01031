//! Output module for read-only views over the persisted snapshots
//!
//! This module handles:
//! - Exporting a source's snapshot as a JSON array
//! - Summarizing record counts and recent crawl runs

mod json;
pub mod stats;

pub use json::export_json;
pub use stats::{load_statistics, print_statistics, SnapshotStatistics};
