//! Records produced by a crawl run
//!
//! Records are built fresh on every run, held in memory for the duration of
//! that run, and handed once to the snapshot store. Nothing mutates a record
//! after it has been pushed onto a run's output collection.

mod price;

pub use price::Price;

use serde::Serialize;

/// A book as seen on a listing page, plus whatever its detail page yielded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Book {
    /// Absolute cover image URL
    pub image_url: Option<String>,

    /// Qualitative rating word taken from the card's class list (e.g. "Three")
    pub rating: Option<String>,

    pub title: Option<String>,

    pub price: Option<Price>,

    /// Absolute URL of the detail page
    pub product_url: Option<String>,

    /// Detail-only fields; all absent when the detail page was skipped or failed
    #[serde(flatten)]
    pub detail: BookDetail,
}

/// Fields that only the detail page carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookDetail {
    /// Third breadcrumb entry
    pub category: Option<String>,

    /// Product description, truncated to the configured cap
    pub description: Option<String>,

    pub availability: Option<String>,
    pub upc: Option<String>,
    pub product_type: Option<String>,
    pub price_excl_tax: Option<Price>,
    pub price_incl_tax: Option<Price>,
    pub tax: Option<Price>,
    pub number_of_reviews: Option<u32>,
}

impl BookDetail {
    /// Returns true when no detail field was extracted
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A quote card from the second source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub text: Option<String>,
    pub author: Option<String>,

    /// Tag labels in page order; may be empty
    pub tags: Vec<String>,
}
