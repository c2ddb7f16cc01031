//! HTTP fetcher implementation
//!
//! This module handles all outbound HTTP requests for the crawler:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Plain GET requests for listing and detail pages
//! - Classifying responses into body, HTTP error or network error
//!
//! There is no retry at any level. A crawl is periodic and best-effort; a
//! failed listing page fails the run and the next trigger tries again.

use crate::config::HttpConfig;
use crate::ScrapeError;
use reqwest::Client;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, body read failure)
    NetworkError {
        /// The underlying client error
        error: reqwest::Error,
    },
}

impl FetchResult {
    /// Converts the result into the page body, or an error naming `url`
    pub fn into_body(self, url: &str) -> Result<String, ScrapeError> {
        match self {
            Self::Success { body, .. } => Ok(body),
            Self::HttpError { status_code } => Err(ScrapeError::Status {
                url: url.to_string(),
                status: status_code,
            }),
            Self::NetworkError { error } => Err(ScrapeError::Http {
                url: url.to_string(),
                source: error,
            }),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use shelf_harvest::config::HttpConfig;
/// use shelf_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a GET request and classifies the outcome
///
/// Redirects are followed by the client; anything other than a 2xx status
/// at the end of the chain is reported as [`FetchResult::HttpError`].
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(error) => {
            if error.is_timeout() {
                tracing::debug!("Request timeout for {}", url);
            } else if error.is_connect() {
                tracing::debug!("Connection failed for {}", url);
            }
            return FetchResult::NetworkError { error };
        }
    };

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            body,
        },
        Err(error) => FetchResult::NetworkError { error },
    }
}

/// Fetches a page and returns its body, failing on any non-success outcome
pub async fn fetch_page(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let result = fetch_url(client, url).await;
    if let FetchResult::Success {
        final_url,
        status_code,
        ..
    } = &result
    {
        tracing::debug!("Fetched {} ({}) -> {}", url, status_code, final_url);
    }
    result.into_body(url)
}
