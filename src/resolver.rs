//! Self-healing feed resolution.
//!
//! Configured feed URLs rot: sites migrate, move their feeds, or start
//! serving an HTML error page on the old path. Instead of letting a source
//! die quietly, the resolver notices a broken feed response, walks back to
//! the site's homepage, and hunts for a replacement feed URL: from
//! `<link rel="alternate">` tags, from anchors that smell like feed links,
//! and finally from a regex sweep of the raw markup. A discovered URL is
//! only adopted after it actually fetches and parses to at least one
//! entry, and is then persisted to a side cache so later runs skip the
//! hunt. The source configuration itself is never modified.

use crate::fetch::{BodyKind, FetchResult, Fetcher, classify_body};
use crate::feeds::{ParsedFeed, parse_feed};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use url::Url;

const MAX_CANDIDATES: usize = 15;

/// One persisted feed-URL correction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedCacheEntry {
    pub url: String,
    pub updated_at: DateTime<Utc>,
    /// The broken URL this one replaced.
    pub from_url: String,
}

/// Side cache of resolved feed URLs, keyed by source name.
///
/// Same persistence contract as the history store: lenient load, atomic
/// save, read once per run, written once at run end.
#[derive(Debug)]
pub struct FeedCache {
    path: Option<PathBuf>,
    entries: HashMap<String, FeedCacheEntry>,
}

impl FeedCache {
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "feed cache corrupt, resetting");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "feed cache unreadable, resetting");
                HashMap::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
        }
    }

    pub fn resolved_url(&self, source_name: &str) -> Option<&str> {
        self.entries.get(source_name).map(|e| e.url.as_str())
    }

    pub fn record(&mut self, source_name: &str, healed: &HealedFeed) {
        self.entries.insert(
            source_name.to_string(),
            FeedCacheEntry {
                url: healed.url.clone(),
                updated_at: Utc::now(),
                from_url: healed.from_url.clone(),
            },
        );
    }

    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// A correction discovered during one run, applied to the cache at run end.
#[derive(Debug, Clone)]
pub struct HealedFeed {
    pub source: String,
    pub url: String,
    pub from_url: String,
}

/// A feed that fetched and parsed, possibly through healing.
#[derive(Debug)]
pub struct ResolvedFeed {
    pub url: String,
    pub feed: ParsedFeed,
    pub http_status: Option<u16>,
    pub healed: Option<HealedFeed>,
}

/// Whether a feed response warrants the discovery hunt.
fn needs_healing(result: &FetchResult) -> bool {
    !matches!(classify_body(result), BodyKind::Xml)
}

fn describe_failure(result: &FetchResult) -> String {
    if let Some(e) = &result.error {
        return e.clone();
    }
    match classify_body(result) {
        BodyKind::Error => format!("HTTP {}", result.status.unwrap_or(0)),
        BodyKind::Empty => "empty body".to_string(),
        BodyKind::Html => "feed URL serves HTML".to_string(),
        BodyKind::Xml => "unparseable feed".to_string(),
    }
}

/// Fetch a source's feed, healing the URL if the configured one is broken.
///
/// `cached_url` (from the side cache) takes precedence over `configured_url`.
/// On total failure the error string describes the original breakage.
#[instrument(level = "info", skip_all, fields(source = %source_name))]
pub async fn fetch_feed_with_healing(
    fetcher: &Fetcher,
    source_name: &str,
    configured_url: &str,
    homepage_override: Option<&str>,
    cached_url: Option<&str>,
) -> Result<ResolvedFeed, String> {
    let primary_url = cached_url.unwrap_or(configured_url);
    let result = fetcher
        .fetch_with_meta(primary_url, crate::models::SourceType::Rss)
        .await;

    if !needs_healing(&result) {
        match parse_feed(&result.text) {
            Ok(feed) if !feed.entries.is_empty() => {
                return Ok(ResolvedFeed {
                    url: primary_url.to_string(),
                    feed,
                    http_status: result.status,
                    healed: None,
                });
            }
            Ok(_) => debug!(url = %primary_url, "feed parsed but has no entries"),
            Err(e) => debug!(url = %primary_url, error = %e, "feed parse failed"),
        }
    }

    let failure = describe_failure(&result);
    warn!(url = %primary_url, %failure, "feed broken, attempting discovery");

    let homepage = match homepage_override {
        Some(h) => h.to_string(),
        None => match derive_homepage(primary_url) {
            Some(h) => h,
            None => return Err(format!("{failure}; no homepage to discover from")),
        },
    };

    let homepage_result = fetcher
        .fetch_with_meta(&homepage, crate::models::SourceType::Html)
        .await;
    if !homepage_result.ok() {
        return Err(format!("{failure}; homepage fetch failed"));
    }

    let candidates = discover_feed_candidates(&homepage_result.text, &homepage);
    debug!(count = candidates.len(), %homepage, "feed candidates");

    for candidate in candidates {
        if candidate == primary_url {
            continue;
        }
        let probe = fetcher
            .fetch_with_meta(&candidate, crate::models::SourceType::Rss)
            .await;
        if classify_body(&probe) != BodyKind::Xml {
            continue;
        }
        let Ok(feed) = parse_feed(&probe.text) else {
            continue;
        };
        if feed.entries.is_empty() {
            continue;
        }
        info!(old = %primary_url, new = %candidate, "feed URL healed");
        let healed = HealedFeed {
            source: source_name.to_string(),
            url: candidate.clone(),
            from_url: primary_url.to_string(),
        };
        return Ok(ResolvedFeed {
            url: candidate,
            feed,
            http_status: probe.status,
            healed: Some(healed),
        });
    }

    Err(failure)
}

/// Scheme + host of a URL, the place to look for feed advertisements.
pub fn derive_homepage(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}", parsed.scheme(), host))
}

static FEEDISH: &[&str] = &["rss", "feed", "atom"];

static RE_EMBEDDED_FEED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s"'<>\\]+(?:rss|feed|atom|\.xml)[^\s"'<>\\]*"#).unwrap()
});

fn looks_feedish(url: &str) -> bool {
    let lower = url.to_lowercase();
    FEEDISH.iter().any(|m| lower.contains(m))
}

/// Collect candidate feed URLs from a homepage document.
///
/// Three sweeps in decreasing trust: `<link rel="alternate">` feed
/// advertisements, anchors whose href smells like a feed, and embedded
/// absolute URLs anywhere in the raw markup (feeds advertised from script
/// blobs or comments). Deduplicated, feed-flavored candidates ordered
/// before bare `.xml` ones, capped at 15.
pub fn discover_feed_candidates(html: &str, base_url: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut candidates: Vec<String> = Vec::new();

    let resolve = |href: &str| -> Option<String> {
        match Url::parse(href) {
            Ok(abs) => Some(abs.to_string()),
            Err(_) => base.as_ref()?.join(href).ok().map(|u| u.to_string()),
        }
    };

    let link_sel = Selector::parse(r#"link[rel="alternate"]"#).expect("static selector");
    for node in doc.select(&link_sel) {
        let feed_type = node
            .value()
            .attr("type")
            .map(|t| t.to_lowercase())
            .unwrap_or_default();
        if !(feed_type.contains("rss") || feed_type.contains("atom") || feed_type.contains("xml")) {
            continue;
        }
        if let Some(url) = node.value().attr("href").and_then(&resolve) {
            candidates.push(url);
        }
    }

    let anchor_sel = Selector::parse("a[href]").expect("static selector");
    for node in doc.select(&anchor_sel) {
        let Some(href) = node.value().attr("href") else {
            continue;
        };
        let lower = href.to_lowercase();
        if looks_feedish(&lower) || lower.ends_with(".xml") {
            if let Some(url) = resolve(href) {
                candidates.push(url);
            }
        }
    }

    for m in RE_EMBEDDED_FEED_URL.find_iter(html) {
        candidates.push(m.as_str().to_string());
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    // stable sort: explicitly feed-flavored URLs first, bare .xml after
    candidates.sort_by_key(|c| !looks_feedish(c));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}
