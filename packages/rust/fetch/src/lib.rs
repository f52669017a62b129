//! Document fetch capability.
//!
//! The reconciler only depends on [`DocumentFetcher`]. [`HttpFetcher`] is the
//! production implementation; [`StaticFetcher`] serves canned documents for
//! offline runs and tests. Timeout and redirect policy belong to the fetcher.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use schemaharvest_shared::{FetchConfig, HarvestError, Result};

// ---------------------------------------------------------------------------
// FetchedDocument
// ---------------------------------------------------------------------------

/// Raw response of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl FetchedDocument {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Accept only a 200 response with a non-empty UTF-8 body.
    pub fn into_html(self, url: &str) -> Result<String> {
        if self.status != 200 {
            return Err(HarvestError::Transport(format!(
                "{url}: HTTP {}",
                self.status
            )));
        }
        if self.body.is_empty() {
            return Err(HarvestError::Transport(format!("{url}: empty body")));
        }
        String::from_utf8(self.body)
            .map_err(|e| HarvestError::Transport(format!("{url}: body is not UTF-8: {e}")))
    }
}

// ---------------------------------------------------------------------------
// DocumentFetcher
// ---------------------------------------------------------------------------

/// Fetches one documentation page.
///
/// Implementations return the status and body as received; checking them is
/// the caller's job (see [`FetchedDocument::into_html`]). Errors are for
/// failures that produced no response at all.
pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedDocument>> + Send;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeout, redirect limit, and user agent.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl DocumentFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let parsed = parse_http_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| HarvestError::Transport(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| HarvestError::Transport(format!("{url}: body read failed: {e}")))?;

        debug!(status, bytes = body.len(), "fetched document");

        Ok(FetchedDocument::new(status, body.to_vec()))
    }
}

/// Parse a URL and require an http(s) scheme.
pub fn parse_http_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| HarvestError::Transport(format!("invalid URL {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(HarvestError::Transport(format!(
            "unsupported URL scheme {scheme:?} in {url}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// StaticFetcher
// ---------------------------------------------------------------------------

/// Serves documents from memory. Unknown URLs answer 404 with an empty body.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedDocument>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a 200 response for `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let html: String = html.into();
        self.insert(url, FetchedDocument::new(200, html));
        self
    }

    /// Register an arbitrary response for `url`.
    pub fn insert(&mut self, url: impl Into<String>, document: FetchedDocument) {
        self.pages.insert(url.into(), document);
    }
}

impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchedDocument::new(404, Vec::new())))
    }
}
