//! Single-submission download and crash-safe save protocol.
//!
//! A submission becomes durable in two steps: the binary payload is written
//! and fsynced first, then the detail page is written to a sibling temp
//! file, fsynced, and renamed to the completion marker. The rename is the
//! only action that can make [`archive::is_archived`] true, so after any
//! interruption the archive holds either a complete pair or no marker at
//! all, never a marker over missing or partial bytes.

use std::path::{Path, PathBuf};

use select::document::Document;
use select::predicate::Name;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::archive::{self, ArchiveError};
use crate::config::CrawlConfig;
use crate::fetch::{FetchError, Fetcher};

/// Errors raised while saving one submission.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The detail page could not be fetched.
    #[error("submission {id}: failed to fetch detail page: {source}")]
    DetailPage {
        /// The submission id.
        id: u64,
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// No link with the visible text "Download" exists on the detail page.
    #[error("submission {id}: no download link found on detail page")]
    DownloadLinkMissing {
        /// The submission id.
        id: u64,
    },

    /// The download link exists but carries no href attribute.
    #[error("submission {id}: download link has no href attribute")]
    DownloadHrefMissing {
        /// The submission id.
        id: u64,
    },

    /// The download href is not a scheme-relative absolute link.
    #[error("submission {id}: unexpected download link format: {href}")]
    DownloadLinkFormat {
        /// The submission id.
        id: u64,
        /// The offending href.
        href: String,
    },

    /// The binary payload fetch failed with something other than 404.
    #[error("submission {id}: failed to download file: {source}")]
    AssetFetch {
        /// The submission id.
        id: u64,
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// A filesystem step of the save protocol failed.
    #[error("submission {id}: {source}")]
    Archive {
        /// The submission id.
        id: u64,
        /// The underlying archive error.
        #[source]
        source: ArchiveError,
    },
}

impl SaveError {
    fn detail_page(id: u64, source: FetchError) -> Self {
        Self::DetailPage { id, source }
    }

    fn asset_fetch(id: u64, source: FetchError) -> Self {
        Self::AssetFetch { id, source }
    }

    fn archive(id: u64, source: ArchiveError) -> Self {
        Self::Archive { id, source }
    }
}

/// Result of a save attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Binary and marker were written.
    Saved,
    /// The marker already existed; nothing was fetched or written.
    AlreadyArchived,
    /// The detail page exists but its download target 404s; the submission
    /// is skipped without aborting the run.
    AssetMissing,
}

/// One artifact: a numeric submission id and the directory its files land in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    id: u64,
    dir: PathBuf,
}

impl Submission {
    /// Creates a submission rooted at `dir`.
    #[must_use]
    pub fn new(id: u64, dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            dir: dir.into(),
        }
    }

    /// The numeric submission id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The directory this submission's files land in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Downloads and saves the submission binary and its detail page.
    ///
    /// Idempotent: an already-archived submission is a no-op. A 404 on the
    /// binary (the detail page exists but its file is gone, which the site
    /// does occasionally) is recorded and skipped rather than failed.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError`] when the detail page cannot be fetched, the
    /// download link is missing or malformed, the binary fetch fails with
    /// anything but 404, or a filesystem step fails.
    pub async fn save(
        &self,
        fetcher: &dyn Fetcher,
        config: &CrawlConfig,
    ) -> Result<SaveOutcome, SaveError> {
        if archive::is_archived(self.id, &self.dir).await {
            debug!(id = self.id, "submission already saved, skipping");
            return Ok(SaveOutcome::AlreadyArchived);
        }

        archive::create_archive_dir(&self.dir)
            .await
            .map_err(|e| SaveError::archive(self.id, e))?;

        let detail_url = format!("{}/view/{}", config.base_url, self.id);
        let page = fetcher
            .get_with_delay(&detail_url)
            .await
            .map_err(|e| SaveError::detail_page(self.id, e))?;

        let href = find_download_href(&page, self.id)?;
        let (download_url, filename) = resolve_download_target(&href, config, self.id)?;

        let file_content = match fetcher.get(&download_url).await {
            Ok(bytes) => bytes,
            Err(FetchError::NotFound { .. }) => {
                // The view page exists but the file 404s. This just happens
                // sometimes; log and skip.
                error!(id = self.id, url = %download_url, "file download 404s, skipping submission");
                return Ok(SaveOutcome::AssetMissing);
            }
            Err(e) => return Err(SaveError::asset_fetch(self.id, e)),
        };

        self.write_pair(&filename, &file_content, &page).await?;
        Ok(SaveOutcome::Saved)
    }

    /// Writes the binary, then promotes the detail page to the marker.
    async fn write_pair(
        &self,
        filename: &str,
        file_content: &[u8],
        page_content: &[u8],
    ) -> Result<(), SaveError> {
        let file_path = self.dir.join(filename);
        archive::write_durably(&file_path, file_content)
            .await
            .map_err(|e| SaveError::archive(self.id, e))?;

        // The marker only ever appears complete, and only after the binary
        // above is durable.
        let marker_path = self.dir.join(format!("{filename}.{}.html", self.id));
        let tmp_path = self.dir.join(format!("{filename}.{}.html.tmp", self.id));
        archive::write_durably(&tmp_path, page_content)
            .await
            .map_err(|e| SaveError::archive(self.id, e))?;
        tokio::fs::rename(&tmp_path, &marker_path)
            .await
            .map_err(|e| SaveError::archive(self.id, ArchiveError::io(marker_path.clone(), e)))?;

        info!(id = self.id, file = %file_path.display(), "saved submission");
        Ok(())
    }
}

/// Finds the href of the link whose visible text is exactly "Download".
///
/// No stable attribute marks the link, so every anchor is scanned for the
/// text.
fn find_download_href(page: &[u8], id: u64) -> Result<String, SaveError> {
    let html = String::from_utf8_lossy(page);
    let document = Document::from(html.as_ref());

    let link = document
        .find(Name("a"))
        .find(|node| node.text().trim() == "Download")
        .ok_or(SaveError::DownloadLinkMissing { id })?;

    let href = link
        .attr("href")
        .ok_or(SaveError::DownloadHrefMissing { id })?;
    Ok(href.to_string())
}

/// Resolves the scheme-relative href into a full URL and a safe filename.
fn resolve_download_target(
    href: &str,
    config: &CrawlConfig,
    id: u64,
) -> Result<(String, String), SaveError> {
    // Asset links are scheme-relative absolute. Anything else means the
    // page layout changed in a way we must not guess around.
    let Some(rest) = href.strip_prefix("//") else {
        return Err(SaveError::DownloadLinkFormat {
            id,
            href: href.to_string(),
        });
    };
    let download_url = format!("{}://{rest}", config.scheme());

    // Splitting on '/' keeps path components out of the filename.
    let last_segment = download_url.rsplit('/').next().unwrap_or_default();
    let filename = sanitize_filename(last_segment);

    Ok((download_url, filename))
}

/// Replaces characters that are invalid in filenames on common platforms.
/// The site already sanitizes upload names; this is a local guarantee, not
/// a guess about the site.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}
