//! Error types for the transport module.

use std::fmt;

use thiserror::Error;

/// Errors produced by [`Fetcher`](super::Fetcher) implementations.
#[derive(Error)]
pub enum FetchError {
    /// The resource does not exist (HTTP 404). Never retried; callers treat
    /// this as "does not exist", not as a transient condition.
    #[error("resource not found (HTTP 404): {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// Any non-success, non-404 HTTP status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level failure (DNS, connection refused, TLS, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded its timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The page was fetched but the registered-users figure used to size
    /// the politeness delay could not be located. The fetched bytes are
    /// carried so the caller can still use the document if it chooses to
    /// treat the missing figure as non-fatal.
    #[error("could not find registered users count in {url}")]
    LoadSignalMissing {
        /// The URL whose document lacked the figure.
        url: String,
        /// The already-fetched response body.
        body: Vec<u8>,
    },
}

impl FetchError {
    /// Creates a not-found error.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a missing-load-signal error carrying the fetched body.
    pub fn load_signal_missing(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self::LoadSignalMissing {
            url: url.into(),
            body,
        }
    }

    /// Whether the retry loop may try again after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus { .. } | Self::Network { .. } | Self::Timeout { .. }
        )
    }

    /// The fetched body, for variants that carry one.
    #[must_use]
    pub fn into_body(self) -> Option<Vec<u8>> {
        match self {
            Self::LoadSignalMissing { body, .. } => Some(body),
            _ => None,
        }
    }
}

// Custom Debug impl: the LoadSignalMissing body is a whole HTML page and
// would drown any log line it appears in.
impl fmt::Debug for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { url } => f.debug_struct("NotFound").field("url", url).finish(),
            Self::HttpStatus { url, status } => f
                .debug_struct("HttpStatus")
                .field("url", url)
                .field("status", status)
                .finish(),
            Self::Network { url, source } => f
                .debug_struct("Network")
                .field("url", url)
                .field("source", source)
                .finish(),
            Self::Timeout { url } => f.debug_struct("Timeout").field("url", url).finish(),
            Self::LoadSignalMissing { url, body } => f
                .debug_struct("LoadSignalMissing")
                .field("url", url)
                .field("body", &format_args!("<{} bytes>", body.len()))
                .finish(),
        }
    }
}
