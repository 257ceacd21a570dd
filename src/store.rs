//! Metadata persistence
//!
//! Writes the aggregated records to a CSV file and a pretty-printed JSON file.
//! Each file is serialized in memory and published with a rename, so a reader
//! sees either the previous file or the complete new one. The two formats are
//! independent: a failure writing one is reported and the other is still
//! attempted.

use crate::error::{Error, Result};
use crate::types::{Event, MetadataFormat, PaperRecord};
use crate::utils::write_atomically;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Column order of the CSV output; also the JSON field names
pub const FIELDS: [&str; 4] = ["year", "title", "abstract_url", "pdf_url"];

/// Outcome of writing both metadata files
#[derive(Debug)]
pub struct SaveReport {
    /// CSV write result
    pub csv: Result<PathBuf>,
    /// JSON write result
    pub json: Result<PathBuf>,
}

impl SaveReport {
    /// True when both files were written
    pub fn is_complete(&self) -> bool {
        self.csv.is_ok() && self.json.is_ok()
    }

    /// Formats that could not be written
    pub fn failed_formats(&self) -> Vec<MetadataFormat> {
        let mut failed = Vec::new();
        if self.csv.is_err() {
            failed.push(MetadataFormat::Csv);
        }
        if self.json.is_err() {
            failed.push(MetadataFormat::Json);
        }
        failed
    }
}

/// Writes records to the configured CSV and JSON paths
#[derive(Clone, Debug)]
pub struct MetadataStore {
    csv_path: PathBuf,
    json_path: PathBuf,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl MetadataStore {
    /// Store writing to `csv_path` and `json_path`
    pub fn new(csv_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            json_path: json_path.into(),
            event_tx: None,
        }
    }

    /// Report each write on `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Persist `records` in both formats, replacing any previous files
    ///
    /// Never short-circuits: both formats are attempted and reported.
    pub async fn save(&self, records: &[PaperRecord]) -> SaveReport {
        let csv = self
            .save_one(MetadataFormat::Csv, &self.csv_path, records)
            .await;
        let json = self
            .save_one(MetadataFormat::Json, &self.json_path, records)
            .await;
        SaveReport { csv, json }
    }

    async fn save_one(
        &self,
        format: MetadataFormat,
        path: &Path,
        records: &[PaperRecord],
    ) -> Result<PathBuf> {
        let result = match format {
            MetadataFormat::Csv => to_csv(records),
            MetadataFormat::Json => to_json(records),
        };
        let result = match result {
            Ok(bytes) => write_file(path, &bytes).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {
                tracing::info!(
                    format = %format,
                    path = %path.display(),
                    records = records.len(),
                    "Metadata saved"
                );
                self.emit_event(Event::MetadataSaved {
                    format,
                    path: path.to_path_buf(),
                    records: records.len(),
                });
            }
            Err(e) => {
                tracing::error!(
                    format = %format,
                    path = %path.display(),
                    error = %e,
                    "Failed to save metadata"
                );
                self.emit_event(Event::MetadataSaveFailed {
                    format,
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
        result.map(|()| path.to_path_buf())
    }

    fn emit_event(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory '{}': {}", parent.display(), e),
            ))
        })?;
    }
    write_atomically(path, bytes).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write '{}': {}", path.display(), e),
        ))
    })
}

/// Serialize records as CSV with a header row, even when there are none
pub fn to_csv(records: &[PaperRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(FIELDS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Serialize records as a pretty-printed JSON array
pub fn to_json(records: &[PaperRecord]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(records)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read records back from a CSV file written by [`MetadataStore`]
pub fn load_csv(path: &Path) -> Result<Vec<PaperRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<PaperRecord>, csv::Error>>()?;
    Ok(records)
}

/// Read records back from a JSON file written by [`MetadataStore`]
pub fn load_json(path: &Path) -> Result<Vec<PaperRecord>> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {}", path.display(), e),
        ))
    })?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
