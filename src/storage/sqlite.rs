//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! The database runs in WAL mode, so a reader on another connection keeps
//! seeing the last committed snapshot while a replace transaction is open.

use crate::records::{Book, BookDetail, Price, Quote};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, Source};
use crate::ScrapeError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BOOK_COLUMNS: &str = "image_url, rating, title, price_cents, product_url, category, \
     description, availability, upc, product_type, price_excl_tax_cents, \
     price_incl_tax_cents, tax_cents, num_reviews";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ScrapeError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ScrapeError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, ScrapeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Snapshot Replacement =====

    fn replace_books(&mut self, books: &[Book]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM books", [])?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO books (position, {}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                BOOK_COLUMNS
            ))?;

            for (position, book) in books.iter().enumerate() {
                let detail = &book.detail;
                stmt.execute(params![
                    position_column(position)?,
                    book.image_url,
                    book.rating,
                    book.title,
                    cents_column("price_cents", book.price)?,
                    book.product_url,
                    detail.category,
                    detail.description,
                    detail.availability,
                    detail.upc,
                    detail.product_type,
                    cents_column("price_excl_tax_cents", detail.price_excl_tax)?,
                    cents_column("price_incl_tax_cents", detail.price_incl_tax)?,
                    cents_column("tax_cents", detail.tax)?,
                    detail.number_of_reviews,
                ])?;
            }
        }

        tx.commit()?;
        Ok(books.len())
    }

    fn replace_quotes(&mut self, quotes: &[Quote]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM quote_tags", [])?;
        tx.execute("DELETE FROM quotes", [])?;

        {
            let mut quote_stmt =
                tx.prepare("INSERT INTO quotes (position, text, author) VALUES (?1, ?2, ?3)")?;
            let mut tag_stmt =
                tx.prepare("INSERT INTO quote_tags (quote_id, position, tag) VALUES (?1, ?2, ?3)")?;

            for (position, quote) in quotes.iter().enumerate() {
                quote_stmt.execute(params![position_column(position)?, quote.text, quote.author])?;
                let quote_id = tx.last_insert_rowid();

                for (tag_position, tag) in quote.tags.iter().enumerate() {
                    tag_stmt.execute(params![quote_id, position_column(tag_position)?, tag])?;
                }
            }
        }

        tx.commit()?;
        Ok(quotes.len())
    }

    // ===== Snapshot Queries =====

    fn load_books(&self) -> StorageResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM books ORDER BY position",
            BOOK_COLUMNS
        ))?;

        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }

    fn load_quotes(&self) -> StorageResult<Vec<Quote>> {
        // Quotes and tags must come from the same snapshot
        let tx = self.conn.unchecked_transaction()?;

        let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
        {
            let mut stmt =
                tx.prepare("SELECT quote_id, tag FROM quote_tags ORDER BY quote_id, position")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
            for row in rows {
                let (quote_id, tag) = row?;
                tags.entry(quote_id).or_default().push(tag);
            }
        }

        let quotes = {
            let mut stmt = tx.prepare("SELECT id, text, author FROM quotes ORDER BY position")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;

            let mut quotes = Vec::new();
            for row in rows {
                let (id, text, author) = row?;
                quotes.push(Quote {
                    text,
                    author,
                    tags: tags.remove(&id).unwrap_or_default(),
                });
            }
            quotes
        };

        tx.commit()?;
        Ok(quotes)
    }

    fn count_records(&self, source: Source) -> StorageResult<u64> {
        let sql = match source {
            Source::Books => "SELECT COUNT(*) FROM books",
            Source::Quotes => "SELECT COUNT(*) FROM quotes",
        };
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Tracking =====

    fn create_run(&mut self, source: Source, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (source, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                source.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, source, started_at, finished_at, config_hash, status, item_count, \
                 error_message FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        item_count: Option<usize>,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let item_count = item_count.map(position_column).transpose()?;
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, item_count = ?3, error_message = ?4 \
             WHERE id = ?5",
            params![status.to_db_string(), now, item_count, error_message, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn recent_runs(&self, source: Option<Source>, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let limit = position_column(limit)?;
        let base = "SELECT id, source, started_at, finished_at, config_hash, status, item_count, \
                    error_message FROM runs";

        let runs = match source {
            Some(source) => {
                let mut stmt =
                    self.conn.prepare(&format!("{} WHERE source = ?1 ORDER BY id DESC LIMIT ?2", base))?;
                let rows = stmt.query_map(params![source.to_db_string(), limit], run_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{} ORDER BY id DESC LIMIT ?1", base))?;
                let rows = stmt.query_map(params![limit], run_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(runs)
    }

    fn last_completed_run(&self, source: Source) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, source, started_at, finished_at, config_hash, status, item_count, \
                 error_message FROM runs WHERE source = ?1 AND status = ?2 \
                 ORDER BY id DESC LIMIT 1",
                params![source.to_db_string(), RunStatus::Completed.to_db_string()],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}

fn position_column(value: usize) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::OutOfRange {
        column: "position",
        value: i64::MAX,
    })
}

fn cents_column(column: &'static str, price: Option<Price>) -> StorageResult<Option<i64>> {
    price
        .map(|p| {
            i64::try_from(p.cents()).map_err(|_| StorageError::OutOfRange {
                column,
                value: i64::MAX,
            })
        })
        .transpose()
}

// CHECK constraints keep every stored amount non-negative
fn price_from_column(cents: Option<i64>) -> Option<Price> {
    cents
        .and_then(|c| u64::try_from(c).ok())
        .map(Price::from_cents)
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        image_url: row.get(0)?,
        rating: row.get(1)?,
        title: row.get(2)?,
        price: price_from_column(row.get(3)?),
        product_url: row.get(4)?,
        detail: BookDetail {
            category: row.get(5)?,
            description: row.get(6)?,
            availability: row.get(7)?,
            upc: row.get(8)?,
            product_type: row.get(9)?,
            price_excl_tax: price_from_column(row.get(10)?),
            price_incl_tax: price_from_column(row.get(11)?),
            tax: price_from_column(row.get(12)?),
            number_of_reviews: row.get(13)?,
        },
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source: Source::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Source::Books),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        item_count: row
            .get::<_, Option<i64>>(6)?
            .and_then(|c| u64::try_from(c).ok()),
        error_message: row.get(7)?,
    })
}
