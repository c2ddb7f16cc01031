//! Detail page fetching and the bounded detail pool
//!
//! Every book card links a detail page carrying category, description and a
//! product information table. Detail pages are independent of each other,
//! so they are fetched by a small pool of tasks. Each task is tagged with its
//! card's listing index and the results are reassembled in listing order
//! once every task has finished.
//!
//! A detail page that cannot be fetched leaves its book with listing-level
//! fields only. It never cancels sibling fetches or the run.

use crate::crawler::fetcher::fetch_page;
use crate::extract::{truncate, FieldRule};
use crate::records::{Book, BookDetail};
use crate::ScrapeError;
use reqwest::Client;
use scraper::Html;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Extraction rules for a book detail page
pub struct DetailRules {
    category: FieldRule,
    description: FieldRule,
    availability: FieldRule,
    upc: FieldRule,
    product_type: FieldRule,
    price_excl_tax: FieldRule,
    price_incl_tax: FieldRule,
    tax: FieldRule,
    reviews: FieldRule,
    description_max_length: usize,
}

impl DetailRules {
    pub fn new(description_max_length: usize) -> Result<Self, ScrapeError> {
        Ok(Self {
            // Home > Books > <category>
            category: FieldRule::nth_text("ul.breadcrumb li a", 2)?,
            description: FieldRule::next_sibling_text("#product_description")?,
            availability: FieldRule::table_cell("Availability")?,
            upc: FieldRule::table_cell("UPC")?,
            product_type: FieldRule::table_cell("Product Type")?,
            price_excl_tax: FieldRule::table_cell("Price (excl. tax)")?,
            price_incl_tax: FieldRule::table_cell("Price (incl. tax)")?,
            tax: FieldRule::table_cell("Tax")?,
            reviews: FieldRule::table_cell("Number of reviews")?,
            description_max_length,
        })
    }

    /// Extracts every detail field; each one is independently optional
    pub fn parse(&self, html: &str) -> BookDetail {
        let document = Html::parse_document(html);
        let root = document.root_element();

        BookDetail {
            category: self.category.extract(root),
            description: self
                .description
                .extract(root)
                .map(|text| truncate(&text, self.description_max_length)),
            availability: self.availability.extract(root),
            upc: self.upc.extract(root),
            product_type: self.product_type.extract(root),
            price_excl_tax: self.price_excl_tax.extract_price(root),
            price_incl_tax: self.price_incl_tax.extract_price(root),
            tax: self.tax.extract_price(root),
            number_of_reviews: self.reviews.extract_count(root),
        }
    }
}

/// Fetches and parses one detail page
pub async fn fetch_detail(
    client: &Client,
    rules: &DetailRules,
    url: &str,
) -> Result<BookDetail, ScrapeError> {
    let body = fetch_page(client, url).await?;
    Ok(rules.parse(&body))
}

/// Books with their detail fields attached, in listing order
#[derive(Debug)]
pub struct EnrichOutcome {
    pub books: Vec<Book>,

    /// Detail pages that were attempted and failed
    pub failed: usize,
}

/// Attaches detail fields to every book that links a detail page
///
/// At most `concurrency` detail pages are in flight at once. The returned
/// books keep the order of `books`.
pub async fn enrich_books(
    client: &Client,
    rules: Arc<DetailRules>,
    books: Vec<Book>,
    concurrency: usize,
) -> EnrichOutcome {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, book) in books.iter().enumerate() {
        let Some(url) = book.product_url.clone() else {
            continue;
        };

        let client = client.clone();
        let rules = Arc::clone(&rules);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let result = fetch_detail(&client, &rules, &url).await;
            (index, url, result)
        });
    }

    let mut details: Vec<Option<BookDetail>> = vec![None; books.len()];
    let mut failed = 0;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(detail))) => details[index] = Some(detail),
            Ok((_, url, Err(e))) => {
                tracing::warn!("Detail page {} failed, keeping listing fields: {}", url, e);
                failed += 1;
            }
            Err(e) => {
                tracing::warn!("Detail task did not complete: {}", e);
                failed += 1;
            }
        }
    }

    let books = books
        .into_iter()
        .zip(details)
        .map(|(book, detail)| Book {
            detail: detail.unwrap_or_default(),
            ..book
        })
        .collect();

    EnrichOutcome { books, failed }
}
