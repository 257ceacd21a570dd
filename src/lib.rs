//! # paper-harvest
//!
//! Concurrent harvester for conference paper archives.
//!
//! A run walks a range of years. For each year it fetches the archive's
//! listing page and extracts one record per paper link (title, abstract URL,
//! derived PDF URL). The merged records are written to a CSV and a JSON
//! file, then every PDF is mirrored into `download_dir/<year>/`.
//!
//! ## Design
//!
//! - **Two phases, strictly ordered** - all metadata is fetched and saved
//!   before the first download starts
//! - **Two-level fan-out** - a bounded pool of years, each running a bounded
//!   pool of paper downloads
//! - **Deterministic output** - records are ordered by year, then by position
//!   on the listing page, whatever order fetches complete in
//! - **Failure isolation** - a failed listing or download is reported and
//!   never aborts its siblings
//! - **Idempotent mirror** - existing PDFs are skipped without a request, and
//!   partial files never appear under a final name
//!
//! ## Quick Start
//!
//! ```no_run
//! use paper_harvest::{Config, Harvester};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.crawl.start_year = 2019;
//!     config.crawl.end_year = 2021;
//!     config.concurrency.paper_concurrency = 8;
//!
//!     let harvester = Harvester::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = harvester.run().await?;
//!     println!("{:?}", report.tally());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Listing-page fetching across a year range
pub mod aggregator;
/// Configuration types
pub mod config;
/// Per-year download coordination
pub mod coordinator;
/// Single-paper download worker
pub mod download;
/// Error types
pub mod error;
/// HTTP transport seam
pub mod fetcher;
/// Top-level harvest driver
pub mod harvester;
/// Listing page parsing
pub mod parser;
/// Retry logic with exponential backoff
pub mod retry;
/// CSV and JSON metadata output
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use aggregator::{Aggregation, MetadataAggregator, YearListing};
pub use config::Config;
pub use coordinator::{YearDownloadCoordinator, YearDownloadReport};
pub use download::DownloadWorker;
pub use error::{DownloadFailure, Error, FetchError, Result};
pub use fetcher::{HttpFetcher, PageFetcher, RetryingFetcher};
pub use harvester::{HarvestReport, Harvester};
pub use parser::ListingParser;
pub use store::{MetadataStore, SaveReport};
pub use types::{DownloadOutcome, DownloadTally, Event, OutcomeKind, PaperRecord, YearGroups};
