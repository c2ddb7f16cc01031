//! Crawler module for listing walks and detail enrichment
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching of listing and detail pages
//! - Paginated listing walks with cycle and page-cap guards
//! - The bounded detail pool for book detail pages
//! - Per-source run coordination and the daily trigger

mod coordinator;
mod detail;
mod fetcher;
mod listing;
mod scheduler;

pub use coordinator::{Coordinator, RunReport};
pub use detail::{enrich_books, fetch_detail, DetailRules, EnrichOutcome};
pub use fetcher::{build_http_client, fetch_page, fetch_url, FetchResult};
pub use listing::{
    walk, BookListing, ListingPage, ListingSource, QuoteListing, StopReason, WalkOutcome,
};
pub use scheduler::{run_daemon, DailyTrigger, TriggerZone};
