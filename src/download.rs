//! Single-paper download worker

use crate::config::Config;
use crate::error::{DownloadFailure, FetchError};
use crate::fetcher::{ByteStream, PageFetcher};
use crate::parser::ListingParser;
use crate::types::{DownloadOutcome, PaperRecord};
use crate::utils::{Publish, paper_filename, publish_no_clobber, remove_quietly, staging_path};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Downloads one paper's PDF into a year directory
///
/// A paper whose derived file already exists is skipped without touching the
/// network. Otherwise the body is streamed into a hidden staging file next to
/// the destination and published only once complete, so a failed or
/// interrupted download never leaves a partial PDF under the final name.
///
/// Failures are returned as [`DownloadOutcome::Failed`], never propagated.
#[derive(Clone)]
pub struct DownloadWorker {
    fetcher: Arc<dyn PageFetcher>,
    parser: ListingParser,
    timeout: Duration,
    resolve_from_abstract: bool,
}

impl DownloadWorker {
    /// Worker using the download timeout and fallback setting from `config`
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            parser: ListingParser::new(config.origin()),
            timeout: config.http.download_timeout,
            resolve_from_abstract: config.download.resolve_from_abstract,
        }
    }

    /// Path `record` is mirrored to inside `dir`
    pub fn destination(record: &PaperRecord, dir: &Path) -> PathBuf {
        dir.join(paper_filename(record))
    }

    /// Ensure `record`'s PDF exists in `dir`
    pub async fn download(&self, record: &PaperRecord, dir: &Path) -> DownloadOutcome {
        let dest = Self::destination(record, dir);

        match tokio::fs::try_exists(&dest).await {
            Ok(true) => {
                tracing::debug!(path = %dest.display(), "Already downloaded, skipping");
                return DownloadOutcome::Skipped { path: dest };
            }
            Ok(false) => {}
            Err(e) => {
                return self.failed(
                    record,
                    DownloadFailure::Filesystem {
                        path: dest,
                        source: e,
                    },
                );
            }
        }

        let result = match self.fetch_into(record.pdf_url(), &dest).await {
            Err(DownloadFailure::Fetch(e)) if e.status() == Some(404) && self.resolve_from_abstract => {
                match self.resolve_pdf_url(record).await {
                    Some(url) if url != record.pdf_url() => {
                        tracing::info!(
                            title = record.title(),
                            url = %url,
                            "Derived PDF link missing, using link from abstract page"
                        );
                        self.fetch_into(&url, &dest).await
                    }
                    _ => Err(DownloadFailure::Fetch(e)),
                }
            }
            other => other,
        };

        match result {
            Ok(outcome) => outcome,
            Err(failure) => self.failed(record, failure),
        }
    }

    fn failed(&self, record: &PaperRecord, reason: DownloadFailure) -> DownloadOutcome {
        tracing::warn!(
            year = record.year(),
            title = record.title(),
            url = record.pdf_url(),
            kind = reason.kind(),
            error = %reason,
            "Failed to download paper"
        );
        DownloadOutcome::Failed { reason }
    }

    /// First `.pdf` link on the record's abstract page
    async fn resolve_pdf_url(&self, record: &PaperRecord) -> Option<String> {
        match self.fetcher.fetch(record.abstract_url(), self.timeout).await {
            Ok(page) => self.parser.find_pdf_link(&page),
            Err(e) => {
                tracing::debug!(
                    url = record.abstract_url(),
                    error = %e,
                    "Abstract page unavailable for PDF link lookup"
                );
                None
            }
        }
    }

    async fn fetch_into(&self, url: &str, dest: &Path) -> Result<DownloadOutcome, DownloadFailure> {
        let mut stream = self.fetcher.fetch_stream(url, self.timeout).await?;

        let staged = staging_path(dest);
        let mut file = tokio::fs::File::create(&staged)
            .await
            .map_err(|e| filesystem(&staged, e))?;

        let written = match self.copy_body(url, &mut stream, &mut file, &staged).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                remove_quietly(&staged).await;
                return Err(e);
            }
        };
        drop(file);

        match publish_no_clobber(&staged, dest).await {
            Ok(Publish::Created) => {
                tracing::info!(path = %dest.display(), bytes = written, "Downloaded");
                Ok(DownloadOutcome::Succeeded {
                    path: dest.to_path_buf(),
                    bytes: written,
                })
            }
            Ok(Publish::AlreadyExists) => {
                tracing::debug!(path = %dest.display(), "Published concurrently, keeping existing file");
                Ok(DownloadOutcome::Skipped {
                    path: dest.to_path_buf(),
                })
            }
            Err(e) => {
                remove_quietly(&staged).await;
                Err(filesystem(dest, e))
            }
        }
    }

    /// Copy the body, bounding the wait for each chunk by the download timeout
    async fn copy_body(
        &self,
        url: &str,
        stream: &mut ByteStream,
        file: &mut tokio::fs::File,
        staged: &Path,
    ) -> Result<u64, DownloadFailure> {
        let mut written = 0u64;
        loop {
            let next = tokio::time::timeout(self.timeout, stream.next())
                .await
                .map_err(|_| FetchError::Timeout {
                    url: url.to_string(),
                })?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| filesystem(staged, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| filesystem(staged, e))?;
        Ok(written)
    }
}

fn filesystem(path: &Path, source: std::io::Error) -> DownloadFailure {
    DownloadFailure::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}
