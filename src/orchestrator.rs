//! Composes creator discovery, per-creator crawling and per-artifact saving
//! into one run.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::CrawlConfig;
use crate::crawl::{CrawlError, Creator, GalleryCrawler, WatchlistCrawler};
use crate::fetch::Fetcher;
use crate::submission::{SaveError, SaveOutcome};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A pagination stage failed.
    #[error(transparent)]
    Crawl(#[from] CrawlError),

    /// A save stage failed.
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// What a run should cover.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Expand this watcher's follow list into creators.
    pub watcher: Option<String>,
    /// Explicitly named creators, processed after the follow list.
    pub creators: Vec<String>,
    /// Crawl whole galleries instead of stopping at archived submissions.
    pub re_crawl: bool,
    /// Skip each creator's scraps section.
    pub skip_scraps: bool,
    /// Base directory; each creator gets a subdirectory named after it.
    pub output_dir: PathBuf,
}

/// Counters reported after a successful run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Creators processed.
    pub creators: usize,
    /// Submissions downloaded and marked archived.
    pub saved: usize,
    /// Submissions skipped because their marker already existed.
    pub already_archived: usize,
    /// Submissions skipped because their download target 404ed.
    pub missing_assets: usize,
}

/// Drives one complete crawl.
pub struct Orchestrator<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a CrawlConfig,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator borrowing the shared transport and config.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a CrawlConfig, options: RunOptions) -> Self {
        Self {
            fetcher,
            config,
            options,
        }
    }

    /// Runs the crawl: expands the watcher's follow list, appends the
    /// explicitly named creators, then lists and saves every submission in
    /// discovery order.
    ///
    /// The first error from any stage aborts the run. Everything saved so
    /// far stays on disk, and because saving is idempotent a re-run resumes
    /// cheaply from wherever this one stopped.
    ///
    /// # Errors
    ///
    /// Returns the first [`RunError`] from any crawl or save stage.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        info!(
            watcher = self.options.watcher.as_deref().unwrap_or(""),
            creators = self.options.creators.len(),
            re_crawl = self.options.re_crawl,
            skip_scraps = self.options.skip_scraps,
            "crawl starting"
        );

        let worklist = self.resolve_worklist().await?;
        let gallery = GalleryCrawler::new(self.fetcher, self.config);
        let mut summary = RunSummary {
            creators: worklist.len(),
            ..RunSummary::default()
        };

        for creator in &worklist {
            let submissions = gallery
                .list(creator, self.options.re_crawl, self.options.skip_scraps)
                .await?;

            for submission in submissions {
                match submission.save(self.fetcher, self.config).await? {
                    SaveOutcome::Saved => summary.saved += 1,
                    SaveOutcome::AlreadyArchived => summary.already_archived += 1,
                    SaveOutcome::AssetMissing => summary.missing_assets += 1,
                }
            }
        }

        info!(
            creators = summary.creators,
            saved = summary.saved,
            already_archived = summary.already_archived,
            missing_assets = summary.missing_assets,
            "crawl complete"
        );
        Ok(summary)
    }

    /// Builds the creator worklist: follow-list entries first, explicit
    /// creators after, each rooted at `<output>/<id>`.
    async fn resolve_worklist(&self) -> Result<Vec<Creator>, RunError> {
        let mut worklist = Vec::new();

        if let Some(watcher) = &self.options.watcher {
            let followed = WatchlistCrawler::new(self.fetcher, self.config)
                .list(watcher)
                .await?;
            debug!(watcher, count = followed.len(), "follow list resolved");
            for id in followed {
                let dir = self.options.output_dir.join(&id);
                worklist.push(Creator::new(id, dir));
            }
        }

        for id in &self.options.creators {
            worklist.push(Creator::new(id.clone(), self.options.output_dir.join(id)));
        }

        Ok(worklist)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::test_support::{MockFetcher, MockResponse, gallery_page, view_page, watchlist_page};

    fn options(output: &std::path::Path) -> RunOptions {
        RunOptions {
            watcher: None,
            creators: Vec::new(),
            re_crawl: false,
            skip_scraps: true,
            output_dir: output.to_path_buf(),
        }
    }

    /// Routes one creator with a single-submission gallery.
    fn route_creator(fetcher: MockFetcher, name: &str, id: u64) -> MockFetcher {
        fetcher
            .route(
                format!("https://site.test/gallery/{name}/1"),
                MockResponse::page(gallery_page(&[id])),
            )
            .route(
                format!("https://site.test/gallery/{name}/2"),
                MockResponse::page(gallery_page(&[])),
            )
            .route(
                format!("https://site.test/view/{id}"),
                MockResponse::page(view_page(&format!("//d.site.test/{name}/{id}.png"))),
            )
            .route(
                format!("https://d.site.test/{name}/{id}.png"),
                MockResponse::Body(b"art".to_vec()),
            )
    }

    #[tokio::test]
    async fn test_run_expands_watcher_then_explicit_creators() {
        let tmp = TempDir::new().unwrap();
        let cfg = CrawlConfig::with_base_url("https://site.test");

        let fetcher = MockFetcher::new().route(
            "https://site.test/watchlist/by/me/1".to_string(),
            MockResponse::page(watchlist_page(&["followed"])),
        );
        let fetcher = route_creator(fetcher, "followed", 11);
        let fetcher = route_creator(fetcher, "named", 22);

        let mut opts = options(tmp.path());
        opts.watcher = Some("me".to_string());
        opts.creators = vec!["named".to_string()];

        let summary = Orchestrator::new(&fetcher, &cfg, opts).run().await.unwrap();

        assert_eq!(summary.creators, 2);
        assert_eq!(summary.saved, 2);

        // Follow-list creator processed before the explicit one.
        let requests = fetcher.requests();
        let followed_pos = requests
            .iter()
            .position(|u| u.contains("/gallery/followed/"))
            .unwrap();
        let named_pos = requests
            .iter()
            .position(|u| u.contains("/gallery/named/"))
            .unwrap();
        assert!(followed_pos < named_pos);

        // Files land under per-creator directories.
        assert!(tmp.path().join("followed").join("11.png").is_file());
        assert!(tmp.path().join("named").join("22.png.22.html").is_file());
    }

    #[tokio::test]
    async fn test_run_aborts_on_first_error() {
        let tmp = TempDir::new().unwrap();
        let cfg = CrawlConfig::with_base_url("https://site.test");

        // First creator's gallery 500s; the second must never be touched.
        let fetcher = MockFetcher::new().route(
            "https://site.test/gallery/broken/1".to_string(),
            MockResponse::Status(500),
        );
        let fetcher = route_creator(fetcher, "fine", 33);

        let mut opts = options(tmp.path());
        opts.creators = vec!["broken".to_string(), "fine".to_string()];

        let result = Orchestrator::new(&fetcher, &cfg, opts).run().await;
        assert!(matches!(result, Err(RunError::Crawl(_))));
        assert!(
            !fetcher.requests().iter().any(|u| u.contains("fine")),
            "run must abort before the second creator"
        );
    }

    #[tokio::test]
    async fn test_run_counts_outcomes() {
        let tmp = TempDir::new().unwrap();
        let cfg = CrawlConfig::with_base_url("https://site.test");

        // Creator with two submissions: one saves, one 404s its asset.
        let fetcher = MockFetcher::new()
            .route(
                "https://site.test/gallery/ann/1".to_string(),
                MockResponse::page(gallery_page(&[2, 1])),
            )
            .route(
                "https://site.test/gallery/ann/2".to_string(),
                MockResponse::page(gallery_page(&[])),
            )
            .route(
                "https://site.test/view/1".to_string(),
                MockResponse::page(view_page("//d.site.test/ann/1.png")),
            )
            .route(
                "https://d.site.test/ann/1.png".to_string(),
                MockResponse::Body(b"art".to_vec()),
            )
            .route(
                "https://site.test/view/2".to_string(),
                MockResponse::page(view_page("//d.site.test/ann/2.png")),
            );
        // No route for 2.png: it 404s.

        let mut opts = options(tmp.path());
        opts.creators = vec!["ann".to_string()];

        let summary = Orchestrator::new(&fetcher, &cfg, opts).run().await.unwrap();
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.missing_assets, 1);
        assert_eq!(summary.already_archived, 0);
    }

    #[tokio::test]
    async fn test_rerun_skips_archived_work() {
        let tmp = TempDir::new().unwrap();
        let cfg = CrawlConfig::with_base_url("https://site.test");
        let fetcher = route_creator(MockFetcher::new(), "ann", 5);

        let mut opts = options(tmp.path());
        opts.creators = vec!["ann".to_string()];

        let first = Orchestrator::new(&fetcher, &cfg, opts.clone())
            .run()
            .await
            .unwrap();
        assert_eq!(first.saved, 1);

        // Second run stops the gallery crawl at the archived id and saves
        // nothing new.
        let second = Orchestrator::new(&fetcher, &cfg, opts).run().await.unwrap();
        assert_eq!(second.saved, 0);
        assert_eq!(second.already_archived, 0, "crawler discards archived ids");
    }
}
