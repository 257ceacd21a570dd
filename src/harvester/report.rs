use crate::aggregator::YearListing;
use crate::coordinator::YearDownloadReport;
use crate::store::SaveReport;
use crate::types::{DownloadTally, PaperRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Summary of a finished harvest
#[derive(Debug)]
pub struct HarvestReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the last year finished
    pub finished_at: DateTime<Utc>,
    /// Listing status of every requested year
    pub years: BTreeMap<u16, YearListing>,
    /// Harvested records, years ascending, document order within a year
    pub records: Vec<PaperRecord>,
    /// Metadata file results
    pub save: SaveReport,
    /// Per-year download results, years ascending; empty for metadata-only runs
    pub downloads: Vec<YearDownloadReport>,
}

impl HarvestReport {
    /// Download outcome counts across all years
    pub fn tally(&self) -> DownloadTally {
        let mut total = DownloadTally::default();
        for year in &self.downloads {
            total.merge(&year.tally);
        }
        total
    }

    /// Years whose listing could not be fetched
    pub fn failed_years(&self) -> Vec<u16> {
        self.years
            .iter()
            .filter(|(_, listing)| listing.is_failed())
            .map(|(year, _)| *year)
            .collect()
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
