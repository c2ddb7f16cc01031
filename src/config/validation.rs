use crate::config::types::{
    BookSourceConfig, Config, CrawlerConfig, HttpConfig, OutputConfig, QuoteSourceConfig,
    ScheduleConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on the detail pool width
const MAX_DETAIL_CONCURRENCY: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_crawler_config(&config.crawler)?;
    validate_schedule_config(&config.schedule)?;
    validate_output_config(&config.output)?;
    validate_book_source(&config.books)?;
    validate_quote_source(&config.quotes)?;
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got timeout-secs={} connect-timeout-secs={}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.detail_concurrency < 1 || config.detail_concurrency > MAX_DETAIL_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "detail-concurrency must be between 1 and {}, got {}",
            MAX_DETAIL_CONCURRENCY, config.detail_concurrency
        )));
    }

    if config.description_max_length < 1 {
        return Err(ConfigError::Validation(
            "description-max-length must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    config.time_of_day()?;
    config.tz()?;
    config.offset()?;
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_book_source(config: &BookSourceConfig) -> Result<(), ConfigError> {
    validate_base_url("books", &config.base_url)
}

fn validate_quote_source(config: &QuoteSourceConfig) -> Result<(), ConfigError> {
    validate_base_url("quotes", &config.base_url)
}

/// A source root must be an absolute http(s) URL ending in `/`
fn validate_base_url(source: &str, base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid {} base-url '{}': {}", source, base_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} base-url '{}' must use http or https",
            source, base_url
        )));
    }

    if !base_url.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "{} base-url '{}' must end with '/'",
            source, base_url
        )));
    }

    Ok(())
}
