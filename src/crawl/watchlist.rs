//! Follow-list pagination: discovers the creators a watcher follows.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::CrawlError;
use crate::config::CrawlConfig;
use crate::fetch::Fetcher;
use crate::invariant::fatal_invariant;

// The capture group excludes '/', so a crafted follow-list entry can never
// smuggle a path separator into a directory name.
static WATCHLIST_USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/user/([^/]+)/").unwrap_or_else(|e| panic!("invalid static regex: {e}"))
});

/// Paginates a watcher's follow list into an ordered set of creator ids.
pub struct WatchlistCrawler<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a CrawlConfig,
}

impl<'a> WatchlistCrawler<'a> {
    /// Creates a crawler borrowing the shared transport and config.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a CrawlConfig) -> Self {
        Self { fetcher, config }
    }

    /// Returns the unique creator ids in `watcher`'s follow list, in order
    /// of first appearance.
    ///
    /// The site repeats a long tail of old entries on every page, so a page
    /// being non-empty proves nothing; the crawl continues only while a
    /// page contributes at least
    /// [`min_new_creators_per_page`](CrawlConfig::min_new_creators_per_page)
    /// ids not seen before.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::WatchlistPage`] when a page fetch fails.
    ///
    /// # Panics
    ///
    /// Halts fatally if pagination exceeds
    /// [`max_watchlist_pages`](CrawlConfig::max_watchlist_pages); the stop
    /// rule no longer matches the site's behavior and continuing would loop
    /// forever.
    pub async fn list(&self, watcher: &str) -> Result<Vec<String>, CrawlError> {
        debug!(watcher, "listing follow list");

        let mut seen = HashSet::new();
        let mut creators = Vec::new();

        for page in 1u32.. {
            if page > self.config.max_watchlist_pages {
                fatal_invariant("maximum follow list pages exceeded");
            }

            let url = format!(
                "{}/watchlist/by/{}/{}",
                self.config.base_url, watcher, page
            );
            // Follow-list pages lack the load figure the delayed path keys
            // on, so this is a plain GET.
            let body = self
                .fetcher
                .get(&url)
                .await
                .map_err(|source| CrawlError::WatchlistPage {
                    url: url.clone(),
                    source,
                })?;

            let html = String::from_utf8_lossy(&body);
            let mut matched = 0usize;
            let mut new_creators = 0usize;
            for captures in WATCHLIST_USER_RE.captures_iter(&html) {
                matched += 1;
                let Some(name) = captures.get(1) else { continue };
                let name = name.as_str();
                if seen.insert(name.to_string()) {
                    creators.push(name.to_string());
                    new_creators += 1;
                }
            }

            info!(
                watcher,
                page,
                count = matched,
                new = new_creators,
                "follow list page processed"
            );

            if new_creators < self.config.min_new_creators_per_page {
                break;
            }
        }

        info!(watcher, count = creators.len(), "follow list complete");
        Ok(creators)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{MockFetcher, MockResponse, watchlist_page};

    fn config() -> CrawlConfig {
        CrawlConfig::with_base_url("https://site.test")
    }

    fn page_url(watcher: &str, page: u32) -> String {
        format!("https://site.test/watchlist/by/{watcher}/{page}")
    }

    #[tokio::test]
    async fn test_list_stops_when_growth_drops() {
        // Pages 1-4 each add two new creators; page 5 repeats page 4.
        let fetcher = MockFetcher::new()
            .route(page_url("w", 1), MockResponse::page(watchlist_page(&["a", "b"])))
            .route(page_url("w", 2), MockResponse::page(watchlist_page(&["b", "c", "d"])))
            .route(page_url("w", 3), MockResponse::page(watchlist_page(&["d", "e", "f"])))
            .route(page_url("w", 4), MockResponse::page(watchlist_page(&["f", "g", "h"])))
            .route(page_url("w", 5), MockResponse::page(watchlist_page(&["g", "h"])));

        let cfg = config();
        let creators = WatchlistCrawler::new(&fetcher, &cfg).list("w").await.unwrap();

        assert_eq!(creators, ["a", "b", "c", "d", "e", "f", "g", "h"]);
        // The growth-drop page itself is fetched, nothing beyond it.
        assert_eq!(fetcher.request_count(), 5);
    }

    #[tokio::test]
    async fn test_list_preserves_first_seen_order() {
        let fetcher = MockFetcher::new()
            .route(page_url("w", 1), MockResponse::page(watchlist_page(&["zeta", "alpha"])))
            .route(page_url("w", 2), MockResponse::page(watchlist_page(&["alpha", "zeta"])));

        let cfg = config();
        let creators = WatchlistCrawler::new(&fetcher, &cfg).list("w").await.unwrap();
        assert_eq!(creators, ["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_list_empty_page_yields_no_creators() {
        let fetcher = MockFetcher::new().route(
            page_url("w", 1),
            MockResponse::page("<html><body>nobody here</body></html>"),
        );

        let cfg = config();
        let creators = WatchlistCrawler::new(&fetcher, &cfg).list("w").await.unwrap();
        assert!(creators.is_empty());
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_rejects_ids_with_path_separators() {
        // A crafted entry with an extra separator must only ever yield the
        // first segment, never a name containing '/'.
        let body = "<a href=\"/user/evil/../up/\">x</a><a href=\"/user/clean/\">y</a>\
                    <a href=\"/user/other/\">z</a>";
        let fetcher = MockFetcher::new().route(page_url("w", 1), MockResponse::page(body));

        let cfg = config();
        let creators = WatchlistCrawler::new(&fetcher, &cfg).list("w").await.unwrap();

        assert!(creators.iter().all(|c| !c.contains('/')), "{creators:?}");
        assert!(creators.contains(&"clean".to_string()));
    }

    #[tokio::test]
    async fn test_list_propagates_fetch_errors() {
        let fetcher =
            MockFetcher::new().route(page_url("w", 1), MockResponse::Status(500));

        let cfg = config();
        let result = WatchlistCrawler::new(&fetcher, &cfg).list("w").await;
        assert!(matches!(result, Err(CrawlError::WatchlistPage { .. })));
    }

    #[tokio::test]
    async fn test_list_halts_fatally_at_page_ceiling() {
        use std::sync::Arc;

        // Every page introduces two fresh ids, so the growth rule never
        // fires and only the ceiling can stop the crawl.
        let fetcher = Arc::new(MockFetcher::new().with_generator(|url| {
            let page: u32 = url.rsplit('/').next()?.parse().ok()?;
            let a = format!("gen{page}a");
            let b = format!("gen{page}b");
            Some(MockResponse::page(watchlist_page(&[a.as_str(), b.as_str()])))
        }));

        let mut cfg = config();
        cfg.max_watchlist_pages = 7;

        let task_fetcher = Arc::clone(&fetcher);
        let handle = tokio::spawn(async move {
            let crawler = WatchlistCrawler::new(task_fetcher.as_ref(), &cfg);
            // Config lives inside the task so the future is 'static.
            crawler.list("w").await
        });

        let join_err = handle.await.unwrap_err();
        assert!(join_err.is_panic(), "ceiling must abort, not error");
        // Pages 1..=7 fetched; the ceiling fires before page 8.
        assert_eq!(fetcher.request_count(), 7);
    }
}
