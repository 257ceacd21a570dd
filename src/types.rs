//! Core types for paper-harvest

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::DownloadFailure;

/// One discovered paper
///
/// Created once per qualifying anchor while parsing a listing page and never
/// mutated afterwards; the fields are only readable through accessors. Both
/// URLs are absolute (archive origin prefixed).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaperRecord {
    year: u16,
    title: String,
    abstract_url: String,
    pdf_url: String,
}

impl PaperRecord {
    /// Create a record from already-absolute URLs
    pub fn new(
        year: u16,
        title: impl Into<String>,
        abstract_url: impl Into<String>,
        pdf_url: impl Into<String>,
    ) -> Self {
        Self {
            year,
            title: title.into(),
            abstract_url: abstract_url.into(),
            pdf_url: pdf_url.into(),
        }
    }

    /// Publication year
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Human-readable title, trimmed anchor text
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Absolute URL of the paper's detail page
    pub fn abstract_url(&self) -> &str {
        &self.abstract_url
    }

    /// Absolute URL of the PDF, derived from the abstract URL
    pub fn pdf_url(&self) -> &str {
        &self.pdf_url
    }
}

/// Records grouped by year, years ascending
///
/// Built once after metadata aggregation and only read during the download
/// phase. Within a year, records keep their listing (document) order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct YearGroups {
    groups: BTreeMap<u16, Vec<PaperRecord>>,
}

impl YearGroups {
    /// Partition `records` by year, preserving relative order inside each year
    pub fn from_records(records: &[PaperRecord]) -> Self {
        let mut groups: BTreeMap<u16, Vec<PaperRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.year()).or_default().push(record.clone());
        }
        Self { groups }
    }

    /// Years present, ascending
    pub fn years(&self) -> impl Iterator<Item = u16> + '_ {
        self.groups.keys().copied()
    }

    /// Records for one year
    pub fn get(&self, year: u16) -> Option<&[PaperRecord]> {
        self.groups.get(&year).map(Vec::as_slice)
    }

    /// Iterate `(year, records)` pairs, years ascending
    pub fn iter(&self) -> impl Iterator<Item = (u16, &[PaperRecord])> + '_ {
        self.groups.iter().map(|(year, records)| (*year, records.as_slice()))
    }

    /// Number of distinct years
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when no year has any record
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Result of one paper download attempt
#[derive(Debug)]
pub enum DownloadOutcome {
    /// A file with the derived name already existed; no network call was made
    /// (or a concurrent worker published it first)
    Skipped {
        /// The existing file
        path: PathBuf,
    },
    /// The PDF was fetched and published at `path`
    Succeeded {
        /// The written file
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// Fetching or writing failed; nothing was left at the final path
    Failed {
        /// Why the download failed
        reason: DownloadFailure,
    },
}

impl DownloadOutcome {
    /// Tri-state classification without the payload
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DownloadOutcome::Skipped { .. } => OutcomeKind::Skipped,
            DownloadOutcome::Succeeded { .. } => OutcomeKind::Succeeded,
            DownloadOutcome::Failed { .. } => OutcomeKind::Failed,
        }
    }
}

/// Outcome classification used in events and tallies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    /// File already present
    Skipped,
    /// File downloaded
    Succeeded,
    /// Download failed
    Failed,
}

/// Counts of download outcomes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTally {
    /// Papers whose file already existed
    pub skipped: usize,
    /// Papers downloaded in this run
    pub succeeded: usize,
    /// Papers that could not be downloaded
    pub failed: usize,
}

impl DownloadTally {
    /// Count one outcome
    pub fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Succeeded => self.succeeded += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
    }

    /// Add another tally into this one
    pub fn merge(&mut self, other: &DownloadTally) {
        self.skipped += other.skipped;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }

    /// Total outcomes counted
    pub fn total(&self) -> usize {
        self.skipped + self.succeeded + self.failed
    }
}

/// Metadata output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFormat {
    /// Comma-separated rows with a header
    Csv,
    /// Pretty-printed array of objects
    Json,
}

impl std::fmt::Display for MetadataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataFormat::Csv => write!(f, "csv"),
            MetadataFormat::Json => write!(f, "json"),
        }
    }
}

/// Event emitted while a harvest runs
///
/// Delivered over a broadcast channel; sending never waits on subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A listing page was fetched and yielded records
    ListingFetched {
        /// Listing year
        year: u16,
        /// Records extracted
        papers: usize,
    },

    /// A listing page was fetched but no anchor qualified
    ListingEmpty {
        /// Listing year
        year: u16,
    },

    /// A listing page could not be fetched
    ListingFailed {
        /// Listing year
        year: u16,
        /// Error message
        error: String,
    },

    /// A metadata file was written
    MetadataSaved {
        /// Output format
        format: MetadataFormat,
        /// Written file
        path: PathBuf,
        /// Records written
        records: usize,
    },

    /// A metadata file could not be written
    MetadataSaveFailed {
        /// Output format
        format: MetadataFormat,
        /// Target file
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Downloads for a year are starting
    YearStarted {
        /// Year
        year: u16,
        /// Papers to process
        total: usize,
    },

    /// One paper finished (in completion order)
    PaperFinished {
        /// Year
        year: u16,
        /// Papers finished so far in this year, including this one
        completed: usize,
        /// Papers in this year
        total: usize,
        /// How it ended
        outcome: OutcomeKind,
    },

    /// All papers of a year are accounted for
    YearFinished {
        /// Year
        year: u16,
        /// Outcome counts
        tally: DownloadTally,
    },

    /// The whole run is over
    HarvestFinished {
        /// Records harvested
        records: usize,
        /// Outcome counts across all years
        tally: DownloadTally,
    },
}
