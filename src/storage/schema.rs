//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Shelf-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs per source
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    item_count INTEGER,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_source ON runs(source);

-- Current book snapshot, in listing order
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    position INTEGER NOT NULL,
    image_url TEXT,
    rating TEXT,
    title TEXT,
    price_cents INTEGER CHECK (price_cents >= 0),
    product_url TEXT,
    category TEXT,
    description TEXT,
    availability TEXT,
    upc TEXT,
    product_type TEXT,
    price_excl_tax_cents INTEGER CHECK (price_excl_tax_cents >= 0),
    price_incl_tax_cents INTEGER CHECK (price_incl_tax_cents >= 0),
    tax_cents INTEGER CHECK (tax_cents >= 0),
    num_reviews INTEGER CHECK (num_reviews >= 0)
);

CREATE INDEX IF NOT EXISTS idx_books_position ON books(position);

-- Current quote snapshot, in listing order
CREATE TABLE IF NOT EXISTS quotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    position INTEGER NOT NULL,
    text TEXT,
    author TEXT
);

CREATE INDEX IF NOT EXISTS idx_quotes_position ON quotes(position);

-- Quote tags, in page order
CREATE TABLE IF NOT EXISTS quote_tags (
    quote_id INTEGER NOT NULL REFERENCES quotes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (quote_id, position)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
