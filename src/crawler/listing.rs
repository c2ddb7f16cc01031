//! Listing walker
//!
//! Walks a paginated listing site from its first page, following the "next"
//! link until a page has none. Each page is parsed by a [`ListingSource`]
//! that knows the site's card layout.
//!
//! The only termination signal a listing site gives is the absence of a
//! next link, so the walker also stops on a next URL it has already fetched
//! and on the configured page cap.

use crate::crawler::fetcher::fetch_page;
use crate::extract::{all_text, compile, FieldRule};
use crate::records::{Book, Quote};
use crate::url::UrlResolver;
use crate::ScrapeError;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Items and next link parsed out of one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage<T> {
    pub items: Vec<T>,

    /// Absolute URL of the following page, if the page links one
    pub next_url: Option<String>,
}

/// A site whose listing pages can be parsed into items
pub trait ListingSource {
    type Item;

    /// Parses one listing page fetched from `page_url`
    ///
    /// Item URLs and the next link must come back absolute.
    fn parse_page(&self, html: &str, page_url: &str) -> ListingPage<Self::Item>;
}

/// Why a walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The last page fetched had no next link
    LastPage,

    /// The next link pointed at a page already fetched in this walk
    Revisit(String),

    /// The page cap was reached while a next link was still pending
    PageLimit,
}

/// Everything a finished walk produced
#[derive(Debug)]
pub struct WalkOutcome<T> {
    pub items: Vec<T>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Loop state carried from one page to the next
struct WalkState {
    current: Option<String>,
    visited: HashSet<String>,
    pages_fetched: u32,
}

impl WalkState {
    fn new(start_url: &str) -> Self {
        Self {
            current: Some(start_url.to_string()),
            visited: HashSet::new(),
            pages_fetched: 0,
        }
    }
}

/// Walks every listing page reachable from `start_url`
///
/// Pages are fetched one after another. A failed page fetch aborts the walk
/// and is returned to the caller; nothing gathered so far is kept.
pub async fn walk<S: ListingSource>(
    client: &Client,
    source: &S,
    start_url: &str,
    max_pages: u32,
) -> Result<WalkOutcome<S::Item>, ScrapeError> {
    let mut state = WalkState::new(start_url);
    let mut items = Vec::new();

    let stop = loop {
        let Some(url) = state.current.take() else {
            break StopReason::LastPage;
        };

        if state.pages_fetched >= max_pages {
            tracing::warn!(
                "Page cap of {} reached before {}; stopping walk",
                max_pages,
                url
            );
            break StopReason::PageLimit;
        }

        let body = fetch_page(client, &url).await?;
        state.pages_fetched += 1;
        state.visited.insert(url.clone());

        let page = source.parse_page(&body, &url);
        tracing::debug!(
            "Listing page {} ({}) yielded {} items",
            state.pages_fetched,
            url,
            page.items.len()
        );
        items.extend(page.items);

        match page.next_url {
            Some(next) if state.visited.contains(&next) => {
                tracing::warn!("Next link on {} points back to {}; stopping walk", url, next);
                break StopReason::Revisit(next);
            }
            next => state.current = next,
        }
    };

    Ok(WalkOutcome {
        items,
        pages_fetched: state.pages_fetched,
        stop,
    })
}

/// Listing rules for the book catalogue
pub struct BookListing {
    resolver: UrlResolver,
    card: Selector,
    image: FieldRule,
    rating: FieldRule,
    title: FieldRule,
    price: FieldRule,
    link: FieldRule,
    next: FieldRule,
}

impl BookListing {
    pub fn new(resolver: UrlResolver) -> Result<Self, ScrapeError> {
        Ok(Self {
            resolver,
            card: compile("section div ol.row li article.product_pod")?,
            image: FieldRule::attr("div.image_container a img", "src")?,
            rating: FieldRule::class_remainder("p.star-rating", "star-rating")?,
            title: FieldRule::attr("h3 a", "title")?,
            price: FieldRule::text("div.product_price p.price_color")?,
            link: FieldRule::attr("h3 a", "href")?,
            next: next_link_rule()?,
        })
    }

    fn parse_card(&self, card: ElementRef<'_>, page_url: &str) -> Book {
        let resolve = |reference: String| {
            Some(reference)
                .filter(|r| !r.trim().is_empty())
                .map(|r| self.resolver.resolve_from(page_url, &r))
        };

        Book {
            image_url: self.image.extract(card).and_then(resolve),
            rating: self.rating.extract(card),
            title: self.title.extract(card),
            price: self.price.extract_price(card),
            product_url: self.link.extract(card).and_then(resolve),
            ..Book::default()
        }
    }
}

impl ListingSource for BookListing {
    type Item = Book;

    fn parse_page(&self, html: &str, page_url: &str) -> ListingPage<Book> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let items = root
            .select(&self.card)
            .map(|card| self.parse_card(card, page_url))
            .collect();

        ListingPage {
            items,
            next_url: next_url(&self.next, &self.resolver, root, page_url),
        }
    }
}

/// Listing rules for the quote site
pub struct QuoteListing {
    resolver: UrlResolver,
    card: Selector,
    text: FieldRule,
    author: FieldRule,
    tags: Selector,
    next: FieldRule,
}

impl QuoteListing {
    pub fn new(resolver: UrlResolver) -> Result<Self, ScrapeError> {
        Ok(Self {
            resolver,
            card: compile("div.quote")?,
            text: FieldRule::text("span.text")?,
            author: FieldRule::text("small.author")?,
            tags: compile("div.tags a.tag")?,
            next: next_link_rule()?,
        })
    }
}

impl ListingSource for QuoteListing {
    type Item = Quote;

    fn parse_page(&self, html: &str, page_url: &str) -> ListingPage<Quote> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let items = root
            .select(&self.card)
            .map(|card| Quote {
                text: self.text.extract(card),
                author: self.author.extract(card),
                tags: all_text(card, &self.tags),
            })
            .collect();

        ListingPage {
            items,
            next_url: next_url(&self.next, &self.resolver, root, page_url),
        }
    }
}

fn next_link_rule() -> Result<FieldRule, ScrapeError> {
    FieldRule::attr("li.next a", "href")
}

fn next_url(
    rule: &FieldRule,
    resolver: &UrlResolver,
    root: ElementRef<'_>,
    page_url: &str,
) -> Option<String> {
    rule.extract(root)
        .filter(|href| !href.trim().is_empty())
        .map(|href| resolver.resolve_from(page_url, &href))
}
