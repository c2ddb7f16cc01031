//! Crawler coordinator - crawl orchestration per source
//!
//! This module runs a full crawl for each source:
//! - Walking every listing page from the source's start URL
//! - Attaching detail fields to books through the detail pool
//! - Handing the complete collection to the snapshot store in one replace
//! - Recording each run in the run history
//!
//! A run that fails anywhere before the replace leaves the previously
//! persisted snapshot live. Crawls are serialized by a run lock so two
//! triggers never write the same snapshot at once.

use crate::config::Config;
use crate::crawler::detail::{enrich_books, DetailRules};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::listing::{walk, BookListing, QuoteListing};
use crate::records::{Book, Quote};
use crate::storage::{RunStatus, SqliteStorage, Source, Storage, StorageResult};
use crate::ScrapeError;
use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Outcome of a combined run; `None` marks a source whose crawl failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub books: Option<usize>,
    pub quotes: Option<usize>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
    books: BookListing,
    quotes: QuoteListing,
    details: Arc<DetailRules>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Coordinator {
    /// Creates a coordinator persisting to the configured database
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash recorded with every run
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self, ScrapeError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, config_hash, storage)
    }

    /// Creates a coordinator around an already opened store
    pub fn with_storage(
        config: Config,
        config_hash: impl Into<String>,
        storage: SqliteStorage,
    ) -> Result<Self, ScrapeError> {
        let client = build_http_client(&config.http)?;
        let books = BookListing::new(config.books.resolver())?;
        let quotes = QuoteListing::new(config.quotes.resolver())?;
        let details = Arc::new(DetailRules::new(config.crawler.description_max_length)?);

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            storage: Arc::new(Mutex::new(storage)),
            client,
            books,
            quotes,
            details,
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Shared handle on the snapshot store
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    /// Crawls the book source and replaces its snapshot
    ///
    /// Returns the number of books persisted.
    pub async fn run_book_crawl(&self) -> Result<usize, ScrapeError> {
        let _guard = self.run_lock.lock().await;
        self.crawl_books().await
    }

    /// Crawls the quote source and replaces its snapshot
    ///
    /// Returns the number of quotes persisted.
    pub async fn run_quote_crawl(&self) -> Result<usize, ScrapeError> {
        let _guard = self.run_lock.lock().await;
        self.crawl_quotes().await
    }

    /// Runs both crawls back to back, books first
    ///
    /// A failure in one source is logged and does not keep the other from
    /// running.
    pub async fn run_all(&self) -> RunReport {
        let _guard = self.run_lock.lock().await;

        let books = match self.crawl_books().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!("Book crawl failed: {}", e);
                None
            }
        };

        let quotes = match self.crawl_quotes().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!("Quote crawl failed: {}", e);
                None
            }
        };

        RunReport { books, quotes }
    }

    async fn crawl_books(&self) -> Result<usize, ScrapeError> {
        let run_id = self.in_store(|s| s.create_run(Source::Books, &self.config_hash))?;
        let start_time = Instant::now();
        tracing::info!("Starting book crawl run {}", run_id);

        let result = match self.collect_books().await {
            Ok(books) => self.in_store(|s| s.replace_books(&books)),
            Err(e) => Err(e),
        };

        self.finish(run_id, Source::Books, &result, start_time)?;
        result
    }

    async fn crawl_quotes(&self) -> Result<usize, ScrapeError> {
        let run_id = self.in_store(|s| s.create_run(Source::Quotes, &self.config_hash))?;
        let start_time = Instant::now();
        tracing::info!("Starting quote crawl run {}", run_id);

        let result = match self.collect_quotes().await {
            Ok(quotes) => self.in_store(|s| s.replace_quotes(&quotes)),
            Err(e) => Err(e),
        };

        self.finish(run_id, Source::Quotes, &result, start_time)?;
        result
    }

    async fn collect_books(&self) -> Result<Vec<Book>, ScrapeError> {
        let crawler = &self.config.crawler;
        let start_url = self.config.books.start_url();

        let outcome = walk(&self.client, &self.books, &start_url, crawler.max_pages).await?;
        tracing::info!(
            "Book listing walk finished after {} pages with {} books ({:?})",
            outcome.pages_fetched,
            outcome.items.len(),
            outcome.stop
        );

        if !crawler.fetch_details {
            return Ok(outcome.items);
        }

        let enriched = enrich_books(
            &self.client,
            Arc::clone(&self.details),
            outcome.items,
            crawler.detail_concurrency,
        )
        .await;

        if enriched.failed > 0 {
            tracing::warn!(
                "{} detail pages failed; those books keep listing fields only",
                enriched.failed
            );
        }

        Ok(enriched.books)
    }

    async fn collect_quotes(&self) -> Result<Vec<Quote>, ScrapeError> {
        let start_url = self.config.quotes.start_url();
        let outcome = walk(
            &self.client,
            &self.quotes,
            &start_url,
            self.config.crawler.max_pages,
        )
        .await?;

        tracing::info!(
            "Quote listing walk finished after {} pages with {} quotes ({:?})",
            outcome.pages_fetched,
            outcome.items.len(),
            outcome.stop
        );

        Ok(outcome.items)
    }

    /// Records the end of a run in the history
    fn finish(
        &self,
        run_id: i64,
        source: Source,
        result: &Result<usize, ScrapeError>,
        start_time: Instant,
    ) -> Result<(), ScrapeError> {
        match result {
            Ok(count) => {
                tracing::info!(
                    "{} crawl run {} persisted {} records in {:?}",
                    source,
                    run_id,
                    count,
                    start_time.elapsed()
                );
                self.in_store(|s| s.finish_run(run_id, RunStatus::Completed, Some(*count), None))
            }
            Err(e) => {
                let message = e.to_string();
                self.in_store(|s| s.finish_run(run_id, RunStatus::Failed, None, Some(&message)))
            }
        }
    }

    fn in_store<T>(
        &self,
        op: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T, ScrapeError> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| ScrapeError::StoragePoisoned)?;
        Ok(op(&mut storage)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> Config {
        let mut config = Config::default();
        // Nothing listens on port 9 of localhost
        config.books.base_url = "http://127.0.0.1:9/".to_string();
        config.quotes.base_url = "http://127.0.0.1:9/".to_string();
        config.http.timeout_secs = 2;
        config.http.connect_timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn test_failed_run_keeps_previous_snapshot() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .replace_books(&[Book {
                title: Some("Previous".to_string()),
                ..Book::default()
            }])
            .unwrap();

        let coordinator = Coordinator::with_storage(unreachable_config(), "hash", storage).unwrap();
        let result = coordinator.run_book_crawl().await;
        assert!(result.is_err());

        let storage = coordinator.storage();
        let storage = storage.lock().unwrap();
        let books = storage.load_books().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title.as_deref(), Some("Previous"));

        let runs = storage.recent_runs(Some(Source::Books), 1).unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].error_message.is_some());
        assert_eq!(runs[0].config_hash, "hash");
    }

    #[tokio::test]
    async fn test_run_all_reports_each_source() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let coordinator = Coordinator::with_storage(unreachable_config(), "hash", storage).unwrap();

        let report = coordinator.run_all().await;
        assert_eq!(report, RunReport { books: None, quotes: None });

        let storage = coordinator.storage();
        let runs = storage.lock().unwrap().recent_runs(None, 10).unwrap();
        assert_eq!(runs.len(), 2);
    }

    #[tokio::test]
    async fn test_poisoned_store_fails_the_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let coordinator = Coordinator::with_storage(unreachable_config(), "hash", storage).unwrap();

        let shared = coordinator.storage();
        let panicked = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("crawl panicked while holding the store");
        })
        .join();
        assert!(panicked.is_err());

        let err = coordinator.run_book_crawl().await.unwrap_err();
        assert!(matches!(err, ScrapeError::StoragePoisoned));
        assert_eq!(err.to_string(), "Storage lock poisoned by a panicked crawl");
    }
}
