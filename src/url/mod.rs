//! URL handling for scraped references
//!
//! Listing and detail pages carry relative hrefs and srcs in a handful of
//! shapes. This module turns them into absolute URLs the way the listing
//! sites expect them to be read.

mod resolve;

pub use resolve::UrlResolver;
