//! Error types for paper-harvest
//!
//! Failures are classified at the granularity that produced them:
//! - [`FetchError`] for a single HTTP GET (listing page or PDF body)
//! - [`DownloadFailure`] for a single paper download (fetch or filesystem)
//! - [`Error`] for everything that surfaces from a whole operation
//!
//! Only [`Error::NoMetadata`] is fatal to a harvest run; every other failure is
//! converted into a per-year or per-paper outcome by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for paper-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for paper-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "start_year")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("invalid configuration file: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// No year in the requested range yielded a single paper record
    #[error("no paper metadata found for years {start_year}-{end_year}")]
    NoMetadata {
        /// First year of the requested range
        start_year: u16,
        /// Last year of the requested range (inclusive)
        end_year: u16,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of one HTTP GET
///
/// Every variant carries the URL so that a log line or report entry is
/// self-describing without the surrounding context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request (or a stalled body read) exceeded its timeout
    #[error("timed out fetching {url}")]
    Timeout {
        /// The URL being fetched
        url: String,
    },

    /// DNS, TCP or TLS failure before a response arrived
    #[error("connection failed for {url}: {reason}")]
    Connection {
        /// The URL being fetched
        url: String,
        /// Transport error message
        reason: String,
    },

    /// The server answered with a non-2xx status
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// The URL being fetched
        url: String,
        /// The HTTP status code
        status: u16,
    },

    /// Anything else (invalid URL, broken body, decode failure)
    #[error("failed to fetch {url}: {reason}")]
    Other {
        /// The URL being fetched
        url: String,
        /// Error message
        reason: String,
    },
}

impl FetchError {
    /// Classify a reqwest error for `url`
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            FetchError::Connection {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else if let Some(status) = error.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Other {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }

    /// The URL this error refers to
    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Connection { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Other { url, .. } => url,
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why a single paper download ended in `Failed`
#[derive(Debug, Error)]
pub enum DownloadFailure {
    /// Fetching the PDF body failed (including mid-stream failures)
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Writing, publishing or cleaning up the file failed
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// The path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl DownloadFailure {
    /// Machine-readable failure kind, used in events and reports
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadFailure::Fetch(FetchError::Timeout { .. }) => "timeout",
            DownloadFailure::Fetch(FetchError::Connection { .. }) => "connection",
            DownloadFailure::Fetch(FetchError::HttpStatus { .. }) => "http_status",
            DownloadFailure::Fetch(FetchError::Other { .. }) => "fetch_other",
            DownloadFailure::Filesystem { .. } => "filesystem",
        }
    }
}
