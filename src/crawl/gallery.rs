//! Gallery pagination: lists a creator's submissions oldest-first.

use std::path::PathBuf;

use select::document::Document;
use select::predicate::Name;
use tracing::{debug, info};

use super::{CrawlError, Creator};
use crate::archive;
use crate::config::CrawlConfig;
use crate::fetch::Fetcher;
use crate::invariant::fatal_invariant;
use crate::submission::Submission;

/// A creator's two content sections. Scraps live in their own subdirectory
/// so their markers never collide with gallery markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Gallery,
    Scraps,
}

impl Section {
    fn path_segment(self) -> &'static str {
        match self {
            Self::Gallery => "gallery",
            Self::Scraps => "scraps",
        }
    }

    fn dir(self, creator: &Creator) -> PathBuf {
        match self {
            Self::Gallery => creator.dir.clone(),
            Self::Scraps => creator.dir.join("scraps"),
        }
    }
}

/// Paginates a creator's gallery (and optionally scraps) into an ordered
/// list of submissions.
pub struct GalleryCrawler<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a CrawlConfig,
}

impl<'a> GalleryCrawler<'a> {
    /// Creates a crawler borrowing the shared transport and config.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a CrawlConfig) -> Self {
        Self { fetcher, config }
    }

    /// Lists `creator`'s submissions, oldest-to-newest, scraps appended
    /// after gallery items.
    ///
    /// Gallery pages run strictly newest-first. When `re_crawl` is false
    /// the crawl therefore stops at the first already-archived id, since
    /// that id and everything beyond it is already on disk. When `re_crawl`
    /// is true
    /// archived ids are still yielded and pagination runs to the end;
    /// save() re-confirms the marker rather than trusting this listing.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::GalleryPage`] when a page fetch fails,
    /// including a missing load figure on an otherwise valid page.
    ///
    /// # Panics
    ///
    /// Halts fatally on a non-numeric submission id or when pagination
    /// exceeds [`max_gallery_pages`](CrawlConfig::max_gallery_pages).
    pub async fn list(
        &self,
        creator: &Creator,
        re_crawl: bool,
        skip_scraps: bool,
    ) -> Result<Vec<Submission>, CrawlError> {
        debug!(creator = %creator.id, re_crawl, "listing submissions");
        let mut submissions = self.crawl_section(creator, Section::Gallery, re_crawl).await?;

        if !skip_scraps {
            debug!(creator = %creator.id, re_crawl, "listing scraps");
            let scraps = self.crawl_section(creator, Section::Scraps, re_crawl).await?;
            submissions.extend(scraps);
        }

        info!(creator = %creator.id, count = submissions.len(), "total submissions found");
        Ok(submissions)
    }

    async fn crawl_section(
        &self,
        creator: &Creator,
        section: Section,
        re_crawl: bool,
    ) -> Result<Vec<Submission>, CrawlError> {
        let section_dir = section.dir(creator);
        let mut submissions = Vec::new();

        'pages: for page in 1u32.. {
            if page > self.config.max_gallery_pages {
                fatal_invariant("maximum gallery pages exceeded");
            }

            let url = format!(
                "{}/{}/{}/{}",
                self.config.base_url,
                section.path_segment(),
                creator.id,
                page
            );
            let body = self
                .fetcher
                .get_with_delay(&url)
                .await
                .map_err(|source| CrawlError::GalleryPage {
                    url: url.clone(),
                    source,
                })?;

            let page_ids = extract_submission_ids(&body);
            debug!(
                creator = %creator.id,
                section = section.path_segment(),
                page,
                count = page_ids.len(),
                "listing page"
            );

            // A page with no artifact links is the end of the section.
            if page_ids.is_empty() {
                break;
            }

            for id in page_ids {
                if !re_crawl && archive::is_archived(id, &section_dir).await {
                    // Ids run newest-first: this one and everything after
                    // it is already on disk.
                    debug!(creator = %creator.id, id, "submission already archived, stopping crawl");
                    break 'pages;
                }
                submissions.push(Submission::new(id, section_dir.clone()));
            }
        }

        submissions.reverse();
        Ok(submissions)
    }
}

/// Pulls submission ids from one gallery page, in page order.
///
/// Only anchors that point at a detail path *and* wrap a preview image
/// count: bare `/view/` links also appear as title text and navigation
/// chrome, and counting those would yield duplicates and junk ids.
fn extract_submission_ids(body: &[u8]) -> Vec<u64> {
    let html = String::from_utf8_lossy(body);
    let document = Document::from(html.as_ref());

    let mut ids = Vec::new();
    for link in document.find(Name("a")) {
        let Some(href) = link.attr("href") else {
            continue;
        };
        if !href.starts_with("/view/") {
            continue;
        }
        if link.find(Name("img")).next().is_none() {
            continue;
        }

        let trimmed = href.trim_end_matches('/');
        let id_str = trimmed.strip_prefix("/view/").unwrap_or(trimmed);
        match id_str.parse::<u64>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                // A detail link without a numeric id means the site's URL
                // scheme changed out from under us.
                fatal_invariant(&format!("unable to extract submission id from {href}"));
            }
        }
    }
    ids
}
