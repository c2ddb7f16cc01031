//! Configuration module for Shelf-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shelf_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("shelf-harvest.toml")).unwrap();
//! println!("Books start at: {}", config.books.start_url());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BookSourceConfig, Config, CrawlerConfig, HttpConfig, OutputConfig, QuoteSourceConfig,
    ScheduleConfig,
};

// Re-export parser functions
pub use parser::{hash_content, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
