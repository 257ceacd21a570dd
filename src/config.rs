//! Configuration types for paper-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which archive to crawl and which years to cover
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Archive origin; listing pages live at `{base_url}/paper_files/paper/{year}`
    /// (default: "https://papers.nips.cc")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// First year to harvest (default: 2017)
    #[serde(default = "default_start_year")]
    pub start_year: u16,

    /// Last year to harvest, inclusive (default: 2023)
    #[serde(default = "default_end_year")]
    pub end_year: u16,

    /// Drop repeated anchors with the same href within one listing (default: false)
    ///
    /// Listing pages can link the same paper more than once. The default keeps
    /// every qualifying anchor, one record each.
    #[serde(default)]
    pub dedupe_links: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            start_year: default_start_year(),
            end_year: default_end_year(),
            dedupe_links: false,
        }
    }
}

/// Two-level fan-out limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Years in flight at once, for both listing fetches and per-year
    /// download coordinators (default: 10)
    #[serde(default = "default_year_concurrency")]
    pub year_concurrency: usize,

    /// Paper downloads in flight at once within one year (default: 20)
    #[serde(default = "default_paper_concurrency")]
    pub paper_concurrency: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            year_concurrency: default_year_concurrency(),
            paper_concurrency: default_paper_concurrency(),
        }
    }
}

/// HTTP transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for a listing page fetch (default: 10 seconds)
    #[serde(default = "default_listing_timeout", with = "duration_serde")]
    pub listing_timeout: Duration,

    /// Timeout for a PDF fetch (default: 15 seconds)
    ///
    /// Bounds the wait for response headers and for each body chunk, so a
    /// large PDF arriving steadily is never cut off.
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// User-Agent header sent with every request (reqwest default if None)
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listing_timeout: default_listing_timeout(),
            download_timeout: default_download_timeout(),
            user_agent: None,
        }
    }
}

/// Where results land on disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root of the PDF mirror; one subdirectory per year (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Tabular metadata output (default: "output.csv")
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// Structured metadata output (default: "output.json")
    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,

    /// Run the download phase after metadata is saved (default: true)
    #[serde(default = "default_true")]
    pub download_pdfs: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            csv_path: default_csv_path(),
            json_path: default_json_path(),
            download_pdfs: true,
        }
    }
}

/// Download worker behavior
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// When the derived PDF URL answers 404, load the abstract page, take its
    /// first `.pdf` link and try once more (default: false)
    #[serde(default)]
    pub resolve_from_abstract: bool,
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 0, no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`Harvester`](crate::Harvester)
///
/// Fields are organized into logical sub-configs:
/// - [`crawl`](CrawlConfig) — archive origin and year range
/// - [`concurrency`](ConcurrencyConfig) — outer (years) and inner (papers) limits
/// - [`http`](HttpConfig) — timeouts and user agent
/// - [`output`](OutputConfig) — metadata files and the PDF mirror
/// - [`download`](DownloadConfig) — worker behavior
/// - [`retry`](RetryConfig) — backoff for transient fetch failures
///
/// All sub-configs except `retry` are flattened, so a TOML file reads as one
/// flat table plus an optional `[retry]` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archive origin and year range
    #[serde(flatten)]
    pub crawl: CrawlConfig,

    /// Fan-out limits
    #[serde(flatten)]
    pub concurrency: ConcurrencyConfig,

    /// HTTP transport settings
    #[serde(flatten)]
    pub http: HttpConfig,

    /// Output locations
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Download worker behavior
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry policy for listing and PDF fetches
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Parse a configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.crawl.start_year > self.crawl.end_year {
            return Err(Error::config(
                "start_year",
                format!(
                    "start_year {} is after end_year {}",
                    self.crawl.start_year, self.crawl.end_year
                ),
            ));
        }

        match url::Url::parse(&self.crawl.base_url) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                return Err(Error::config(
                    "base_url",
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
            // Paper links are root-relative, so only an origin joins correctly
            Ok(url) if url.path() != "/" || url.query().is_some() || url.fragment().is_some() => {
                return Err(Error::config(
                    "base_url",
                    format!(
                        "'{}' must be an origin (scheme, host and port) without a path",
                        self.crawl.base_url
                    ),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(Error::config(
                    "base_url",
                    format!("'{}' is not an absolute URL: {}", self.crawl.base_url, e),
                ));
            }
        }

        if self.concurrency.year_concurrency == 0 {
            return Err(Error::config("year_concurrency", "must be at least 1"));
        }
        if self.concurrency.paper_concurrency == 0 {
            return Err(Error::config("paper_concurrency", "must be at least 1"));
        }
        if self.http.listing_timeout.is_zero() {
            return Err(Error::config("listing_timeout", "must be at least 1 second"));
        }
        if self.http.download_timeout.is_zero() {
            return Err(Error::config(
                "download_timeout",
                "must be at least 1 second",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config("retry.backoff_multiplier", "must be >= 1.0"));
        }

        Ok(())
    }

    /// Base URL without a trailing slash, ready for `base + href` concatenation
    pub fn origin(&self) -> &str {
        self.crawl.base_url.trim_end_matches('/')
    }

    /// Listing page URL for one year
    pub fn listing_url(&self, year: u16) -> String {
        format!("{}/paper_files/paper/{}", self.origin(), year)
    }

    /// Download directory for one year
    pub fn year_dir(&self, year: u16) -> PathBuf {
        self.output.download_dir.join(year.to_string())
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://papers.nips.cc".to_string()
}

fn default_start_year() -> u16 {
    2017
}

fn default_end_year() -> u16 {
    2023
}

fn default_year_concurrency() -> usize {
    10
}

fn default_paper_concurrency() -> usize {
    20
}

fn default_listing_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("output.csv")
}

fn default_json_path() -> PathBuf {
    PathBuf::from("output.json")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    0
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
