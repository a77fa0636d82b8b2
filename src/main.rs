//! CLI entry point for the artmirror crawler.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use artmirror_core::auth;
use artmirror_core::{
    CrawlConfig, DelayPolicy, HttpClient, Orchestrator, RetryPolicy, RunOptions,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // RUST_LOG env var wins over the --debug flag default.
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let delay = if args.no_throttle {
        // Even without load throttling, keep a small delay between requests.
        DelayPolicy::unthrottled()
    } else {
        DelayPolicy::default()
    };

    let cookie_jar = match &args.cookies {
        Some(path) => Some(auth::load_cookie_file(path).with_context(|| {
            format!("failed to load cookies from {}", path.display())
        })?),
        None => None,
    };

    let client = HttpClient::with_policies(cookie_jar, RetryPolicy::default(), delay);
    let config = CrawlConfig::default();
    let options = RunOptions {
        watcher: args.watcher.clone(),
        creators: args.creators.clone(),
        re_crawl: args.recrawl,
        skip_scraps: args.skip_scraps,
        output_dir: args.output.clone(),
    };

    info!("artmirror starting");
    let summary = Orchestrator::new(&client, &config, options).run().await?;

    info!(
        creators = summary.creators,
        saved = summary.saved,
        already_archived = summary.already_archived,
        missing_assets = summary.missing_assets,
        "done"
    );
    Ok(())
}
