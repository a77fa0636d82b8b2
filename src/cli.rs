//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Archive submissions from an art community site.
///
/// Expands a watcher's follow list and/or downloads explicitly named
/// creators into a resumable on-disk archive. Interrupted runs resume
/// wherever they stopped; nothing but the output directory holds state.
#[derive(Parser, Debug)]
#[command(name = "artmirror")]
#[command(author, version, about)]
#[command(group(
    clap::ArgGroup::new("targets")
        .required(true)
        .multiple(true)
        .args(["watcher", "creators"])
))]
pub struct Args {
    /// Download every creator in this user's follow list
    #[arg(short = 'u', long)]
    pub watcher: Option<String>,

    /// Download all submissions from a comma-separated list of creators
    #[arg(short = 'a', long, value_delimiter = ',')]
    pub creators: Vec<String>,

    /// Output directory for downloads
    #[arg(short, long, default_value = "dl")]
    pub output: PathBuf,

    /// Path to a Netscape-format cookies.txt file for logged-in access
    #[arg(short, long)]
    pub cookies: Option<PathBuf>,

    /// Re-crawl whole galleries looking for missed submissions
    #[arg(short, long)]
    pub recrawl: bool,

    /// Don't download scraps
    #[arg(short, long)]
    pub skip_scraps: bool,

    /// Disable the long load-aware cooldown between requests
    #[arg(short, long)]
    pub no_throttle: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}
