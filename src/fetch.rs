//! Bounded-timeout HTTP fetching with full response metadata.
//!
//! Every network call in the pipeline goes through [`Fetcher::fetch_with_meta`],
//! which never returns an error: failures are carried as data on the
//! [`FetchResult`] so callers aggregate outcomes instead of handling
//! exceptions. One call, one GET, no retries: a flaky source gets another
//! chance on the next run, not in this one.
//!
//! The module also owns [`classify_body`], the tagged replacement for
//! string-sniffing "does this look like a feed" checks scattered around
//! call sites.

use crate::models::SourceType;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const FETCH_TIMEOUT_SECS: u64 = 20;
const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) nyhetssvep/0.2";

/// Outcome of one fetch. `error` is set instead of raising; `text` is empty
/// whenever `error` is present.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub text: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub final_url: String,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            status: None,
            content_type: None,
            final_url: url.to_string(),
            error: Some(error.into()),
        }
    }

    /// A usable response: no transport error and a 2xx status.
    pub fn ok(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

/// Tagged result of sniffing a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// XML-looking document, a feed candidate.
    Xml,
    /// HTML page; for a configured feed URL this means the feed is broken.
    Html,
    /// Nothing came back.
    Empty,
    /// Transport failure or non-2xx status.
    Error,
}

/// Classify a fetch outcome for the feed-resolver trigger check.
///
/// Only the first 500 chars are inspected for HTML markers, matching the
/// usual position of `<!doctype html>` / `<html>` in real error pages.
pub fn classify_body(result: &FetchResult) -> BodyKind {
    if result.error.is_some() || !result.ok() {
        return BodyKind::Error;
    }
    let trimmed = result.text.trim_start();
    if trimmed.is_empty() {
        return BodyKind::Empty;
    }
    let head: String = trimmed.chars().take(500).collect::<String>().to_lowercase();
    if head.contains("<!doctype html") || head.contains("<html") {
        return BodyKind::Html;
    }
    if head.starts_with("<?xml")
        || head.contains("<rss")
        || head.contains("<feed")
        || head.contains("<rdf:rdf")
    {
        return BodyKind::Xml;
    }
    // Unrecognized bodies are treated as pages, not feeds.
    BodyKind::Html
}

/// Shared HTTP client with a hard per-request timeout.
///
/// Constructed once per run and handed out through the pipeline context;
/// individual calls are stateless.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client }
    }

    /// One bounded GET with source-type-specific headers.
    ///
    /// Weather endpoints get a bare user agent (curl-style services key off
    /// it); feeds and pages get full content negotiation headers.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_with_meta(&self, url: &str, kind: SourceType) -> FetchResult {
        let request = self.client.get(url).headers(headers_for(kind));

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "fetch failed");
                return FetchResult::failed(url, e.to_string());
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let final_url = response.url().to_string();

        match response.text().await {
            Ok(text) => {
                debug!(%url, status, bytes = text.len(), "fetched");
                FetchResult {
                    text,
                    status: Some(status),
                    content_type,
                    final_url,
                    error: None,
                }
            }
            Err(e) => {
                warn!(%url, status, error = %e, "body read failed");
                FetchResult {
                    text: String::new(),
                    status: Some(status),
                    content_type,
                    final_url,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn headers_for(kind: SourceType) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(UA));
    if kind != SourceType::Weather {
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/html;q=0.8, */*;q=0.5",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("sv-SE,sv;q=0.9,en;q=0.6"));
    }
    headers
}
