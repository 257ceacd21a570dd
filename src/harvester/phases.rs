//! The two harvest phases
//!
//! Phase 1 must finish for every year before phase 2 starts: the year
//! grouping is built from the complete, saved record set.

use super::Harvester;
use crate::aggregator::{Aggregation, MetadataAggregator};
use crate::coordinator::{YearDownloadCoordinator, YearDownloadReport};
use crate::download::DownloadWorker;
use crate::error::{Error, Result};
use crate::store::{MetadataStore, SaveReport};
use crate::types::{PaperRecord, YearGroups};
use futures::stream::{self, StreamExt};

impl Harvester {
    /// Fetch every listing, then persist the merged records
    pub(crate) async fn metadata_phase(&self) -> Result<(Aggregation, SaveReport)> {
        let aggregator = MetadataAggregator::new(
            self.fetcher.clone(),
            self.config.clone(),
            self.event_tx.clone(),
        );
        let aggregation = aggregator.aggregate().await;

        if aggregation.records.is_empty() {
            tracing::error!(
                start_year = self.config.crawl.start_year,
                end_year = self.config.crawl.end_year,
                failed_years = ?aggregation.failed_years(),
                "No paper metadata found in any year"
            );
            return Err(Error::NoMetadata {
                start_year: self.config.crawl.start_year,
                end_year: self.config.crawl.end_year,
            });
        }

        let store = MetadataStore::new(&self.config.output.csv_path, &self.config.output.json_path)
            .with_events(self.event_tx.clone());
        let save = store.save(&aggregation.records).await;
        if !save.is_complete() {
            tracing::warn!(
                failed_formats = ?save.failed_formats(),
                "Some metadata files could not be written, continuing with downloads"
            );
        }

        Ok((aggregation, save))
    }

    /// Download every year's papers, years and papers both bounded
    pub(crate) async fn download_phase(&self, records: &[PaperRecord]) -> Vec<YearDownloadReport> {
        let groups = YearGroups::from_records(records);
        let year_limit = self.config.concurrency.year_concurrency.max(1);
        let paper_limit = self.config.concurrency.paper_concurrency.max(1);
        tracing::info!(
            years = groups.len(),
            papers = records.len(),
            year_concurrency = year_limit,
            paper_concurrency = paper_limit,
            "Starting downloads"
        );

        let worker = DownloadWorker::new(self.fetcher.clone(), &self.config);
        let coordinator = YearDownloadCoordinator::new(
            worker,
            &self.config.output.download_dir,
            self.event_tx.clone(),
        );
        let coordinator = &coordinator;

        let mut reports: Vec<YearDownloadReport> = stream::iter(groups.iter())
            .map(|(year, records)| coordinator.process_year(year, records, paper_limit))
            .buffer_unordered(year_limit)
            .collect()
            .await;

        reports.sort_by_key(|report| report.year);
        reports
    }
}
