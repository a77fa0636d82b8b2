//! Pagination state machines for creator discovery and gallery listing.
//!
//! Both crawlers share the same shape: fetch numbered pages until a stop
//! rule fires, with a hard page ceiling that turns a broken stop rule into
//! a fatal halt instead of an endless crawl.

mod gallery;
mod watchlist;

pub use gallery::GalleryCrawler;
pub use watchlist::WatchlistCrawler;

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;

/// A content-publishing account and the directory its downloads land in.
///
/// Re-constructed on every discovery; nothing about a creator is persisted
/// beyond the directory named after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    /// The creator's account id.
    pub id: String,
    /// Directory the creator's submissions are saved under.
    pub dir: PathBuf,
}

impl Creator {
    /// Creates a creator rooted at `dir`.
    #[must_use]
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }
}

/// Errors raised while paginating the site.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A follow-list page could not be fetched.
    #[error("failed to fetch follow list page {url}: {source}")]
    WatchlistPage {
        /// The page URL.
        url: String,
        /// The transport failure.
        #[source]
        source: FetchError,
    },

    /// A gallery or scraps page could not be fetched.
    #[error("failed to fetch gallery page {url}: {source}")]
    GalleryPage {
        /// The page URL.
        url: String,
        /// The transport failure.
        #[source]
        source: FetchError,
    },
}
