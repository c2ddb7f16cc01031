use crate::url::UrlResolver;
use crate::ConfigError;
use chrono::{FixedOffset, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;

/// Main configuration structure for Shelf-Harvest
///
/// Every section and every key is optional; an empty file yields the
/// defaults, which point at the two public demo sites.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub crawler: CrawlerConfig,
    pub schedule: ScheduleConfig,
    pub output: OutputConfig,
    pub books: BookSourceConfig,
    pub quotes: QuoteSourceConfig,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("shelf-harvest/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of listing pages fetched per source and run
    pub max_pages: u32,

    /// Maximum number of detail pages fetched at the same time
    pub detail_concurrency: usize,

    /// Descriptions longer than this many characters are truncated
    pub description_max_length: usize,

    /// Whether book detail pages are fetched at all
    pub fetch_details: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 1000,
            detail_concurrency: 8,
            description_max_length: 2000,
            fetch_details: true,
        }
    }
}

/// Largest accepted fixed offset, in minutes either side of UTC
const MAX_OFFSET_MINUTES: u32 = 18 * 60;

/// Recurring trigger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScheduleConfig {
    /// Wall-clock time of the daily run, `HH:MM`
    pub daily_at: String,

    /// IANA time zone the daily time is expressed in
    pub time_zone: String,

    /// Fixed UTC offset (minutes) used instead of `time-zone` when set
    pub utc_offset_minutes: Option<i32>,

    /// Run both crawls once as soon as the process is ready
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: "02:00".to_string(),
            time_zone: "Europe/Belgrade".to_string(),
            utc_offset_minutes: None,
            run_on_startup: true,
        }
    }
}

impl ScheduleConfig {
    /// Parses `daily-at` as a wall-clock time
    pub fn time_of_day(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|e| {
            ConfigError::Validation(format!(
                "daily-at must be HH:MM, got '{}': {}",
                self.daily_at, e
            ))
        })
    }

    /// Parses `time-zone` as an IANA zone name
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.time_zone.trim().parse::<Tz>().map_err(|e| {
            ConfigError::Validation(format!(
                "time-zone must be an IANA zone name, got '{}': {}",
                self.time_zone, e
            ))
        })
    }

    /// The fixed offset overriding `time-zone`, if one is configured
    pub fn offset(&self) -> Result<Option<FixedOffset>, ConfigError> {
        let Some(minutes) = self.utc_offset_minutes else {
            return Ok(None);
        };

        Some(minutes)
            .filter(|m| m.unsigned_abs() <= MAX_OFFSET_MINUTES)
            .and_then(|m| m.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .map(Some)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "utc-offset-minutes must be within +/-18 hours, got {}",
                    minutes
                ))
            })
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./shelf-harvest.db".to_string(),
        }
    }
}

/// Book listing source
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BookSourceConfig {
    /// Site root, ending in `/`
    pub base_url: String,

    /// Path of the first listing page, relative to the root
    pub start_path: String,

    /// Directory holding paginated listing and detail pages
    pub section: String,

    /// Prefix of page-index hrefs that omit the section
    pub page_prefix: String,
}

impl Default for BookSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://books.toscrape.com/".to_string(),
            start_path: "index.html".to_string(),
            section: "catalogue/".to_string(),
            page_prefix: "page".to_string(),
        }
    }
}

impl BookSourceConfig {
    pub fn start_url(&self) -> String {
        format!("{}{}", self.resolver().root(), self.start_path)
    }

    pub fn resolver(&self) -> UrlResolver {
        UrlResolver::new(self.base_url.as_str())
            .with_section(self.section.as_str(), self.page_prefix.as_str())
    }
}

/// Quote listing source
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuoteSourceConfig {
    /// Site root, ending in `/`
    pub base_url: String,

    /// Path of the first listing page, relative to the root
    pub start_path: String,
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quotes.toscrape.com/".to_string(),
            start_path: String::new(),
        }
    }
}

impl QuoteSourceConfig {
    pub fn start_url(&self) -> String {
        format!("{}{}", self.resolver().root(), self.start_path)
    }

    pub fn resolver(&self) -> UrlResolver {
        UrlResolver::new(self.base_url.as_str())
    }
}
