//! Utility functions for filenames and all-or-nothing file writes

use crate::types::PaperRecord;
use rand::Rng;
use std::path::{Path, PathBuf};

/// Extension given to every mirrored paper
pub const PDF_EXTENSION: &str = "pdf";

/// Stem used when neither the title nor the URL yields a usable name
const FALLBACK_STEM: &str = "paper";

/// Replace every character outside `[A-Za-z0-9 _-]` with `_`
///
/// Non-ASCII letters are replaced too, so the result is safe on every
/// filesystem the mirror may land on.
///
/// # Examples
///
/// ```
/// use paper_harvest::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("Foo/Bar: Baz?"), "Foo_Bar_ Baz_");
/// assert_eq!(sanitize_title("Self-Attention_v2"), "Self-Attention_v2");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name a paper is mirrored under: sanitized title plus `.pdf`
///
/// A title that sanitizes to nothing but whitespace falls back to the last
/// path segment of the PDF URL (without extension), then to `paper`. Two
/// records with the same sanitized title map to the same file name.
///
/// # Examples
///
/// ```
/// use paper_harvest::types::PaperRecord;
/// use paper_harvest::utils::paper_filename;
///
/// let record = PaperRecord::new(2019, "Foo/Bar: Baz?", "https://x/a-Abstract.html", "https://x/a-paper.pdf");
/// assert_eq!(paper_filename(&record), "Foo_Bar_ Baz_.pdf");
///
/// let untitled = PaperRecord::new(2022, "", "https://x/hash/abc", "https://x/hash/abc.pdf");
/// assert_eq!(paper_filename(&untitled), "abc.pdf");
/// ```
#[must_use]
pub fn paper_filename(record: &PaperRecord) -> String {
    let stem = sanitize_title(record.title());
    let stem = if stem.trim().is_empty() {
        url_stem(record.pdf_url())
            .map(sanitize_title)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_STEM.to_string())
    } else {
        stem
    };
    format!("{stem}.{PDF_EXTENSION}")
}

/// Last path segment of a URL without query, fragment or extension
fn url_stem(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let stem = match segment.rfind('.') {
        Some(0) | None => segment,
        Some(idx) => &segment[..idx],
    };
    (!stem.is_empty()).then_some(stem)
}

/// Unique hidden sibling of `final_path` used to stage a write
///
/// Staging in the destination directory keeps the final rename or link on
/// one filesystem. The name has a fixed length, so any destination name the
/// filesystem accepts can be staged.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let suffix: u64 = rand::thread_rng().r#gen();
    final_path.with_file_name(format!(".{suffix:016x}.part"))
}

/// How a staged file ended up at its destination
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publish {
    /// The staged file now lives at the destination
    Created,
    /// Something else got there first; the destination was left untouched
    AlreadyExists,
}

/// Move `staged` to `dest` unless `dest` already exists
///
/// Uses a hard link so the existence check and the publish are one atomic
/// step. Filesystems without hard links fall back to a rename, where the last
/// writer wins. The staged file is gone afterwards in every `Ok` case.
pub async fn publish_no_clobber(staged: &Path, dest: &Path) -> std::io::Result<Publish> {
    match tokio::fs::hard_link(staged, dest).await {
        Ok(()) => {
            remove_quietly(staged).await;
            Ok(Publish::Created)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            remove_quietly(staged).await;
            Ok(Publish::AlreadyExists)
        }
        Err(e) => {
            tracing::debug!(
                error = %e,
                path = %dest.display(),
                "Hard link unavailable, publishing with rename"
            );
            tokio::fs::rename(staged, dest).await?;
            Ok(Publish::Created)
        }
    }
}

/// Replace `dest` with `contents` so readers never observe a partial file
pub async fn write_atomically(dest: &Path, contents: &[u8]) -> std::io::Result<()> {
    let staged = staging_path(dest);
    if let Err(e) = tokio::fs::write(&staged, contents).await {
        remove_quietly(&staged).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&staged, dest).await {
        remove_quietly(&staged).await;
        return Err(e);
    }
    Ok(())
}

/// Best-effort removal of a leftover staging file
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staging file");
    }
}
