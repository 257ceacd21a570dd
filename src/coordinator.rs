//! Per-year download coordination
//!
//! Runs a [`DownloadWorker`] for every record of one year with at most
//! `limit` downloads in flight. Progress goes out as [`Event::PaperFinished`]
//! in completion order; the returned outcomes are in document order.

use crate::download::DownloadWorker;
use crate::error::DownloadFailure;
use crate::types::{DownloadOutcome, DownloadTally, Event, PaperRecord};
use crate::utils::paper_filename;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Everything that happened to one year's papers
#[derive(Debug)]
pub struct YearDownloadReport {
    /// The year
    pub year: u16,
    /// Directory the year's PDFs were written to
    pub dir: PathBuf,
    /// One outcome per input record, same order as the input
    pub outcomes: Vec<DownloadOutcome>,
    /// Outcome counts
    pub tally: DownloadTally,
    /// File names claimed by more than one record of this year
    pub collisions: Vec<String>,
}

/// Downloads one year's papers under a bounded pool
pub struct YearDownloadCoordinator {
    worker: DownloadWorker,
    download_dir: PathBuf,
    event_tx: broadcast::Sender<Event>,
}

impl YearDownloadCoordinator {
    /// Coordinator writing below `download_dir/<year>/`
    pub fn new(
        worker: DownloadWorker,
        download_dir: impl Into<PathBuf>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            worker,
            download_dir: download_dir.into(),
            event_tx,
        }
    }

    /// Download every record of `year` with at most `limit` in flight
    ///
    /// Creates the year directory first (an existing one is fine). If it
    /// cannot be created, every record fails with a filesystem error and no
    /// fetch is attempted.
    pub async fn process_year(
        &self,
        year: u16,
        records: &[PaperRecord],
        limit: usize,
    ) -> YearDownloadReport {
        let dir = self.download_dir.join(year.to_string());
        let total = records.len();
        tracing::info!(year, papers = total, dir = %dir.display(), "Downloading year");
        self.emit_event(Event::YearStarted { year, total });

        let collisions = filename_collisions(records);
        for name in &collisions {
            tracing::warn!(
                year,
                filename = name.as_str(),
                "Several papers share this file name; only the first one downloaded is kept"
            );
        }

        let outcomes = match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => self.download_all(year, &dir, records, limit).await,
            Err(e) => {
                tracing::error!(year, dir = %dir.display(), error = %e, "Failed to create year directory");
                records
                    .iter()
                    .map(|_| DownloadOutcome::Failed {
                        reason: DownloadFailure::Filesystem {
                            path: dir.clone(),
                            source: std::io::Error::new(e.kind(), e.to_string()),
                        },
                    })
                    .collect()
            }
        };

        let mut tally = DownloadTally::default();
        for outcome in &outcomes {
            tally.record(outcome.kind());
        }

        tracing::info!(
            year,
            succeeded = tally.succeeded,
            skipped = tally.skipped,
            failed = tally.failed,
            "Year downloads complete"
        );
        self.emit_event(Event::YearFinished { year, tally });

        YearDownloadReport {
            year,
            dir,
            outcomes,
            tally,
            collisions,
        }
    }

    async fn download_all(
        &self,
        year: u16,
        dir: &Path,
        records: &[PaperRecord],
        limit: usize,
    ) -> Vec<DownloadOutcome> {
        let total = records.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let mut finished: Vec<(usize, DownloadOutcome)> =
            stream::iter(records.iter().enumerate())
                .map(|(index, record)| async move {
                    let outcome = self.worker.download(record, dir).await;
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    self.emit_event(Event::PaperFinished {
                        year,
                        completed: done,
                        total,
                        outcome: outcome.kind(),
                    });
                    (index, outcome)
                })
                .buffer_unordered(limit.max(1))
                .collect()
                .await;

        finished.sort_by_key(|(index, _)| *index);
        finished.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Sanitized file names used by more than one record, in first-seen order
fn filename_collisions(records: &[PaperRecord]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for record in records {
        let name = paper_filename(record);
        let count = counts.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(name);
        }
    }
    order
}
