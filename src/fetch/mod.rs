//! Load-aware retrying HTTP transport.
//!
//! Everything above this module sees the network only as
//! "GET(url) → bytes or classified error". Retries, timeouts, cookies and
//! the politeness delay all live below the [`Fetcher`] boundary.

mod client;
mod constants;
mod error;

pub use client::{DelayPolicy, HttpClient, RetryPolicy};
pub use constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_INTERVAL, HIGH_USER_THRESHOLD};
pub use error::FetchError;

use async_trait::async_trait;

/// Abstract GET transport. In production this is [`HttpClient`]; tests
/// substitute a canned-response mock.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] immediately on a 404 (never
    /// retried), or the final classified failure once retries are
    /// exhausted.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetches `url` like [`get`](Fetcher::get), then sleeps according to
    /// the load figure found in the returned document.
    ///
    /// # Errors
    ///
    /// In addition to the [`get`](Fetcher::get) errors, returns
    /// [`FetchError::LoadSignalMissing`] (carrying the fetched bytes) when
    /// the page holds no recognizable load figure.
    async fn get_with_delay(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
