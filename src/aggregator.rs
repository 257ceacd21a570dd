//! Metadata aggregation across years
//!
//! Fetches one listing page per year with bounded parallelism, parses each as
//! soon as it arrives and concatenates the per-year results in ascending year
//! order once every fetch has settled. Completion order never leaks into the
//! output: results are keyed by year, not pushed in arrival order.
//!
//! A year whose listing cannot be fetched contributes no records and does not
//! disturb the others; it is reported through [`YearListing::Failed`].

use crate::config::Config;
use crate::error::FetchError;
use crate::fetcher::PageFetcher;
use crate::parser::ListingParser;
use crate::types::{Event, PaperRecord};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tokio::sync::broadcast;

/// How one year's listing turned out
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum YearListing {
    /// The page was fetched and yielded records
    Fetched {
        /// Records extracted
        papers: usize,
    },
    /// The page was fetched but no anchor qualified
    Empty,
    /// The page could not be fetched
    Failed(FetchError),
}

impl YearListing {
    /// Records this year contributed
    pub fn papers(&self) -> usize {
        match self {
            YearListing::Fetched { papers } => *papers,
            YearListing::Empty | YearListing::Failed(_) => 0,
        }
    }

    /// True when the listing fetch failed
    pub fn is_failed(&self) -> bool {
        matches!(self, YearListing::Failed(_))
    }
}

/// Result of a metadata aggregation
#[derive(Clone, Debug, Default)]
pub struct Aggregation {
    /// All records, grouped by ascending year, document order within a year
    pub records: Vec<PaperRecord>,
    /// Per-year listing status for every requested year
    pub years: BTreeMap<u16, YearListing>,
}

impl Aggregation {
    /// Years whose listing could not be fetched, ascending
    pub fn failed_years(&self) -> Vec<u16> {
        self.years
            .iter()
            .filter(|(_, listing)| listing.is_failed())
            .map(|(year, _)| *year)
            .collect()
    }
}

/// Fetches and parses listing pages for a range of years
pub struct MetadataAggregator {
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<Config>,
    parser: ListingParser,
    event_tx: broadcast::Sender<Event>,
}

impl MetadataAggregator {
    /// Create an aggregator for the archive named in `config`
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        config: Arc<Config>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let parser = ListingParser::new(config.origin()).dedupe_links(config.crawl.dedupe_links);
        Self {
            fetcher,
            config,
            parser,
            event_tx,
        }
    }

    /// Aggregate the configured year range at the configured year concurrency
    pub async fn aggregate(&self) -> Aggregation {
        self.aggregate_years(
            self.config.crawl.start_year..=self.config.crawl.end_year,
            self.config.concurrency.year_concurrency,
        )
        .await
    }

    /// Aggregate `years` with at most `limit` listing fetches in flight
    ///
    /// Returns only after every year has settled.
    pub async fn aggregate_years(&self, years: RangeInclusive<u16>, limit: usize) -> Aggregation {
        let limit = limit.max(1);
        tracing::info!(
            start_year = *years.start(),
            end_year = *years.end(),
            concurrency = limit,
            "Fetching listing pages"
        );

        let settled: BTreeMap<u16, (Vec<PaperRecord>, YearListing)> = stream::iter(years)
            .map(|year| async move { (year, self.fetch_year(year).await) })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut aggregation = Aggregation::default();
        for (year, (records, listing)) in settled {
            aggregation.records.extend(records);
            aggregation.years.insert(year, listing);
        }

        tracing::info!(
            records = aggregation.records.len(),
            years = aggregation.years.len(),
            failed_years = ?aggregation.failed_years(),
            "Metadata aggregation complete"
        );
        aggregation
    }

    /// Fetch and parse one year's listing; never fails, failures are reported
    pub async fn fetch_year(&self, year: u16) -> (Vec<PaperRecord>, YearListing) {
        let url = self.config.listing_url(year);
        tracing::debug!(year, url = %url, "Fetching listing page");

        let page = match self
            .fetcher
            .fetch(&url, self.config.http.listing_timeout)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(year, url = %url, error = %e, "Listing fetch failed, skipping year");
                self.emit_event(Event::ListingFailed {
                    year,
                    error: e.to_string(),
                });
                return (Vec::new(), YearListing::Failed(e));
            }
        };

        let records = self.parser.extract_papers(year, &page);
        if records.is_empty() {
            tracing::warn!(year, url = %url, bytes = page.len(), "Listing page has no paper links");
            self.emit_event(Event::ListingEmpty { year });
            return (records, YearListing::Empty);
        }

        tracing::info!(year, papers = records.len(), "Listing parsed");
        self.emit_event(Event::ListingFetched {
            year,
            papers: records.len(),
        });
        let papers = records.len();
        (records, YearListing::Fetched { papers })
    }

    fn emit_event(&self, event: Event) {
        // No receivers is fine; the event is dropped
        self.event_tx.send(event).ok();
    }
}
