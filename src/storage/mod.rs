//! Storage module for persisting crawl snapshots
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Atomic per-source snapshot replacement
//! - Snapshot queries for the read-only views
//! - Crawl run history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ScrapeError;
use std::fmt;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScrapeError> {
    SqliteStorage::new(path)
}

/// The listing site a snapshot or run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Books,
    Quotes,
}

impl Source {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Books => "books",
            Self::Quotes => "quotes",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "books" => Some(Self::Books),
            "quotes" => Some(Self::Quotes),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source: Source,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub item_count: Option<u64>,
    pub error_message: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
