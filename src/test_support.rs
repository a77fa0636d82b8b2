//! Test doubles shared by the crate's unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::fetch::{FetchError, Fetcher};

/// Canned response for one URL.
#[derive(Clone)]
pub enum MockResponse {
    /// 200 with the given body.
    Body(Vec<u8>),
    /// 404.
    NotFound,
    /// Any other status.
    Status(u16),
}

impl MockResponse {
    /// Convenience constructor from page text.
    pub fn page(body: impl Into<String>) -> Self {
        Self::Body(body.into().into_bytes())
    }
}

/// Canned-response [`Fetcher`]: maps URLs to responses, records every
/// request in order, and can synthesize responses for URLs without a canned
/// entry. Unknown URLs 404.
///
/// Both trait methods answer identically; the politeness delay is a real
/// transport concern and is tested against the real client.
#[derive(Default)]
pub struct MockFetcher {
    routes: HashMap<String, MockResponse>,
    generator: Option<Box<dyn Fn(&str) -> Option<MockResponse> + Send + Sync>>,
    log: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a canned response for `url` (builder style).
    #[must_use]
    pub fn route(mut self, url: impl Into<String>, response: MockResponse) -> Self {
        self.routes.insert(url.into(), response);
        self
    }

    /// Sets a fallback generator consulted for URLs with no canned entry.
    #[must_use]
    pub fn with_generator(
        mut self,
        generator: impl Fn(&str) -> Option<MockResponse> + Send + Sync + 'static,
    ) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// Every requested URL, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Total number of requests served.
    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.log.lock().unwrap().push(url.to_string());

        let response = self
            .routes
            .get(url)
            .cloned()
            .or_else(|| self.generator.as_ref().and_then(|g| g(url)));

        match response {
            Some(MockResponse::Body(body)) => Ok(body),
            Some(MockResponse::Status(status)) => Err(FetchError::http_status(url, status)),
            Some(MockResponse::NotFound) | None => Err(FetchError::not_found(url)),
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.respond(url)
    }

    async fn get_with_delay(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.respond(url)
    }
}

/// Gallery page HTML with one artifact link per id (preview image embedded,
/// the way real gallery figures are rendered) plus a navigation link that a
/// correct crawler must ignore.
pub fn gallery_page(ids: &[u64]) -> String {
    let mut links = String::new();
    for id in ids {
        links.push_str(&format!(
            "<figure><a href=\"/view/{id}/\"><img src=\"//t.example/{id}@300.jpg\"></a>\
             <a href=\"/view/{id}/\">title text</a></figure>"
        ));
    }
    format!(
        "<html><body><div class=\"online-stats\">42 registered users online</div>\
         <section>{links}</section><a href=\"/view/next\">Next page chrome</a></body></html>"
    )
}

/// Follow-list page HTML with one entry per creator id.
pub fn watchlist_page(ids: &[&str]) -> String {
    let mut entries = String::new();
    for id in ids {
        entries.push_str(&format!("<a href=\"/user/{id}/\">{id}</a>"));
    }
    format!("<html><body>{entries}</body></html>")
}

/// Detail page HTML with a Download link pointing at `href`.
pub fn view_page(href: &str) -> String {
    format!(
        "<html><body><div class=\"online-stats\">42 registered users online</div>\
         <a href=\"/other\">Elsewhere</a><a href=\"{href}\">Download</a></body></html>"
    )
}
