//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::records::{Book, Quote};
use crate::storage::{RunRecord, RunStatus, Source};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for snapshot backend implementations
///
/// A replace operation swaps the entire persisted collection for one source.
/// Readers must observe either the full previous collection or the full new
/// one; a failed replace leaves the previous collection untouched.
pub trait Storage {
    // ===== Snapshot Replacement =====

    /// Replaces every persisted book with `books`, keeping their order
    ///
    /// Returns the number of books written.
    fn replace_books(&mut self, books: &[Book]) -> StorageResult<usize>;

    /// Replaces every persisted quote with `quotes`, keeping their order
    fn replace_quotes(&mut self, quotes: &[Quote]) -> StorageResult<usize>;

    // ===== Snapshot Queries =====

    /// Loads the persisted books in listing order
    fn load_books(&self) -> StorageResult<Vec<Book>>;

    /// Loads the persisted quotes in listing order, tags in page order
    fn load_quotes(&self) -> StorageResult<Vec<Quote>>;

    /// Counts the persisted records for a source
    fn count_records(&self, source: Source) -> StorageResult<u64>;

    // ===== Run Tracking =====

    /// Records the start of a crawl run
    fn create_run(&mut self, source: Source, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Marks a run finished
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        item_count: Option<usize>,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Most recent runs first, optionally for one source only
    fn recent_runs(&self, source: Option<Source>, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// The newest run of `source` that completed, however many failed since
    fn last_completed_run(&self, source: Source) -> StorageResult<Option<RunRecord>>;
}
