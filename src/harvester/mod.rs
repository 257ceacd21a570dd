//! Top-level harvest driver split into focused submodules.
//!
//! The [`Harvester`] owns the configuration, the shared fetcher and the event
//! channel. A run is two strictly ordered phases:
//! - [`phases`] - metadata aggregation and persistence, then per-year downloads
//! - [`report`] - the [`HarvestReport`] returned when both phases are done

mod phases;
mod report;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use report::HarvestReport;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{HttpFetcher, PageFetcher, RetryingFetcher};
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers miss events rather than
/// stall the run
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Harvests listing metadata for a range of years and mirrors the PDFs
///
/// # Examples
///
/// ```no_run
/// use paper_harvest::{Config, Harvester};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::default();
/// config.crawl.start_year = 2021;
/// config.crawl.end_year = 2022;
///
/// let harvester = Harvester::new(config)?;
/// let mut events = harvester.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// });
///
/// let report = harvester.run().await?;
/// println!("{} records, {:?}", report.records.len(), report.tally());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Harvester {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    event_tx: broadcast::Sender<Event>,
}

impl Harvester {
    /// Validate `config` and build a harvester backed by real HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = HttpFetcher::new(config.http.user_agent.as_deref())?;
        let fetcher = Arc::new(RetryingFetcher::new(http, config.retry.clone()));
        Ok(Self::assemble(config, fetcher))
    }

    /// Validate `config` and build a harvester over any transport
    ///
    /// The configured retry policy is layered on top of `fetcher`.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(RetryingFetcher::new(fetcher, config.retry.clone()));
        Ok(Self::assemble(config, fetcher))
    }

    fn assemble(config: Config, fetcher: Arc<dyn PageFetcher>) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            fetcher,
            event_tx,
        }
    }

    /// Subscribe to run events
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The validated configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run both phases to completion
    ///
    /// Per-year and per-paper failures are recorded in the report. The only
    /// error is [`Error::NoMetadata`](crate::Error::NoMetadata): no year
    /// yielded a single record, in which case nothing is written.
    pub async fn run(&self) -> Result<HarvestReport> {
        let started_at = chrono::Utc::now();
        tracing::info!(
            start_year = self.config.crawl.start_year,
            end_year = self.config.crawl.end_year,
            base_url = %self.config.origin(),
            "Starting harvest"
        );

        let (aggregation, save) = self.metadata_phase().await?;

        let downloads = if self.config.output.download_pdfs {
            self.download_phase(&aggregation.records).await
        } else {
            tracing::info!("PDF downloads disabled, metadata only");
            Vec::new()
        };

        let report = HarvestReport {
            started_at,
            finished_at: chrono::Utc::now(),
            years: aggregation.years,
            records: aggregation.records,
            save,
            downloads,
        };

        let tally = report.tally();
        tracing::info!(
            records = report.records.len(),
            succeeded = tally.succeeded,
            skipped = tally.skipped,
            failed = tally.failed,
            failed_years = ?report.failed_years(),
            elapsed_ms = report.elapsed().num_milliseconds(),
            "Harvest complete"
        );
        self.emit_event(Event::HarvestFinished {
            records: report.records.len(),
            tally,
        });

        Ok(report)
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }
}
