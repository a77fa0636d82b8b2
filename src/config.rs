//! Crawl configuration, threaded explicitly through constructors.

/// Site root used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://www.furaffinity.net";

/// Site location and pagination limits for one crawl run.
///
/// The page ceilings and the growth threshold are tuned to the site's
/// current pagination behavior. They are configuration, not derived values:
/// the site repeats a long tail of old follow-list entries on every page,
/// and the ceilings exist only to turn a broken stop rule into a hard halt
/// instead of an infinite loop.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Site root, scheme included, no trailing slash.
    pub base_url: String,

    /// Hard ceiling on follow-list pages per watcher. 100 pages would be
    /// roughly 20,000 creators.
    pub max_watchlist_pages: u32,

    /// Hard ceiling on gallery or scraps pages per section.
    pub max_gallery_pages: u32,

    /// Minimum new creators a follow-list page must contribute for the
    /// crawl to continue to the next page.
    pub min_new_creators_per_page: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_watchlist_pages: 100,
            max_gallery_pages: 1000,
            min_new_creators_per_page: 2,
        }
    }
}

impl CrawlConfig {
    /// Creates a config pointed at a different site root, keeping the
    /// default limits. Tests point this at a local mock server.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Scheme of the configured site root. Asset links on detail pages are
    /// scheme-relative (`//host/...`); they resolve against this.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.base_url.split("://").next().unwrap_or("https")
    }
}
