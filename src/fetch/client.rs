//! HTTP client with retries and load-aware politeness delays.
//!
//! The delay policy reads the "registered users online" figure the site
//! embeds in most pages and sleeps a long cooldown while the site is busy.
//! Follow-list pages lack the figure, which is why [`Fetcher`] exposes both
//! a plain and a delayed GET.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::{Client, StatusCode};
use select::document::Document;
use select::predicate::{Attr, Class, Name, Predicate};
use tracing::{debug, error, info};

use super::Fetcher;
use super::constants::{
    DEFAULT_DELAY, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_INTERVAL, HIGH_USER_DELAY,
    HIGH_USER_THRESHOLD, REQUEST_TIMEOUT,
};
use super::error::FetchError;
use crate::user_agent;

/// Title attribute marking the stats span on the classic-theme layout.
const CLASSIC_STATS_SPAN_TITLE: &str = "Measured in the last 900 seconds";

static REGISTERED_USERS_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(\d+)\s+registered"));

fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Fixed-interval retry settings for GET requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub attempts: u32,
    /// Fixed sleep between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy. Tests pass a zero interval so retries run
    /// without sleeping.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }
}

/// Politeness delay settings driven by the site's registered-users figure.
#[derive(Debug, Clone)]
pub struct DelayPolicy {
    /// Figure above which `high_delay` applies instead of `default_delay`.
    pub user_threshold: u64,
    /// Cooldown while the site is busy.
    pub high_delay: Duration,
    /// Delay applied after every delayed fetch, even under light load.
    pub default_delay: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            user_threshold: HIGH_USER_THRESHOLD,
            high_delay: HIGH_USER_DELAY,
            default_delay: DEFAULT_DELAY,
        }
    }
}

impl DelayPolicy {
    /// Collapses the long cooldown to the short delay. Even without load
    /// throttling the crawler keeps a small delay between requests.
    #[must_use]
    pub fn unthrottled() -> Self {
        Self {
            high_delay: DEFAULT_DELAY,
            ..Self::default()
        }
    }

    /// No sleeping at all. Test use only.
    #[must_use]
    pub fn none() -> Self {
        Self {
            user_threshold: HIGH_USER_THRESHOLD,
            high_delay: Duration::ZERO,
            default_delay: Duration::ZERO,
        }
    }
}

/// Retrying HTTP transport with session-cookie support.
///
/// Created once per run and shared by every component; the cookie jar is
/// the only state beyond the configured policies.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
    delay: DelayPolicy,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default retry and delay policies and no cookies.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policies(None, RetryPolicy::default(), DelayPolicy::default())
    }

    /// Creates a client with a cookie jar for logged-in crawling.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn with_cookie_jar(cookie_jar: Arc<Jar>) -> Self {
        Self::with_policies(Some(cookie_jar), RetryPolicy::default(), DelayPolicy::default())
    }

    /// Creates a client with explicit policies.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_policies(
        cookie_jar: Option<Arc<Jar>>,
        retry: RetryPolicy,
        delay: DelayPolicy,
    ) -> Self {
        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_user_agent());
        if let Some(jar) = cookie_jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            retry,
            delay,
        }
    }

    /// Performs a single GET without retries.
    async fn get_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::not_found(url)),
            status if !status.is_success() => Err(FetchError::http_status(url, status.as_u16())),
            _ => {
                let bytes = response.bytes().await.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::timeout(url)
                    } else {
                        FetchError::network(url, e)
                    }
                })?;
                Ok(bytes.to_vec())
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "GET");
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    info!(url, attempt, error = %err, "GET attempt failed");
                    if attempt >= attempts {
                        error!(url, error = %err, "GET failed after all attempts");
                        return Err(err);
                    }
                    tokio::time::sleep(self.retry.interval).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn get_with_delay(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let body = self.get(url).await?;

        let Some(registered_users) = parse_registered_users(&body) else {
            return Err(FetchError::load_signal_missing(url, body));
        };

        if registered_users > self.delay.user_threshold {
            info!(
                count = registered_users,
                "high registered user count, applying long cooldown"
            );
            tokio::time::sleep(self.delay.high_delay).await;
        } else {
            tokio::time::sleep(self.delay.default_delay).await;
        }

        Ok(body)
    }
}

/// Extracts the registered-users-online figure from page HTML.
///
/// The default layout carries the figure inside an `online-stats` element.
/// The classic theme omits that element, so the grandparent of the span
/// titled "Measured in the last 900 seconds" is consulted as a fallback.
fn parse_registered_users(body: &[u8]) -> Option<u64> {
    let html = String::from_utf8_lossy(body);
    let document = Document::from(html.as_ref());

    let text = match document.find(Class("online-stats")).next() {
        Some(node) => node.text(),
        None => {
            let span = document
                .find(Name("span").and(Attr("title", CLASSIC_STATS_SPAN_TITLE)))
                .next()?;
            span.parent()?.parent()?.text()
        }
    };

    let captures = REGISTERED_USERS_RE.captures(&text)?;
    captures.get(1)?.as_str().parse().ok()
}
