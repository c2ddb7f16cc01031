//! Statistics over the persisted snapshots
//!
//! This module provides functionality for extracting and displaying
//! snapshot sizes and crawl run history from the storage layer.

use crate::storage::{RunRecord, Source, Storage};
use crate::ScrapeError;

/// How many runs the summary lists
const RECENT_RUN_LIMIT: usize = 10;

/// Snapshot statistics summary
#[derive(Debug, Clone)]
pub struct SnapshotStatistics {
    /// Books in the live snapshot
    pub books: u64,

    /// Quotes in the live snapshot
    pub quotes: u64,

    /// Latest runs across both sources, newest first
    pub recent_runs: Vec<RunRecord>,

    /// Last completed run per source
    pub last_book_run: Option<RunRecord>,
    pub last_quote_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> Result<SnapshotStatistics, ScrapeError> {
    let books = storage.count_records(Source::Books)?;
    let quotes = storage.count_records(Source::Quotes)?;
    let recent_runs = storage.recent_runs(None, RECENT_RUN_LIMIT)?;

    Ok(SnapshotStatistics {
        books,
        quotes,
        recent_runs,
        last_book_run: storage.last_completed_run(Source::Books)?,
        last_quote_run: storage.last_completed_run(Source::Quotes)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Snapshot Statistics ===\n");

    println!("Snapshots:");
    println!(
        "  Books: {}{}",
        stats.books,
        last_refresh(&stats.last_book_run)
    );
    println!(
        "  Quotes: {}{}",
        stats.quotes,
        last_refresh(&stats.last_quote_run)
    );
    println!();

    if stats.recent_runs.is_empty() {
        println!("No crawl runs recorded yet");
        return;
    }

    println!("Recent Runs ({}):", stats.recent_runs.len());
    for run in &stats.recent_runs {
        let items = run
            .item_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{} {} {} started {} items {}",
            run.id,
            run.source,
            run.status.to_db_string(),
            run.started_at,
            items
        );
        if let Some(message) = &run.error_message {
            println!("      error: {}", message);
        }
    }
}

fn last_refresh(run: &Option<RunRecord>) -> String {
    match run.as_ref().and_then(|r| r.finished_at.as_deref()) {
        Some(finished) => format!(" (refreshed {})", finished),
        None => String::new(),
    }
}
