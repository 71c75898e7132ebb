//! Data models for scraped articles and per-source result groups.
//!
//! This module defines the core data structures flowing through the pipeline:
//! - [`SourceType`]: the three kinds of configured origins
//! - [`ArticleItem`]: one extracted article record
//! - [`RelatedArticle`]: supplementary material attached by enrichment
//! - [`SourceGroup`]: everything one source produced in one run
//!
//! A `SourceGroup` is the unit of output: the downstream narration stage
//! consumes a list of groups sorted by priority, each exposing at least
//! `{title, link, summary}` per item.

use serde::{Deserialize, Serialize};

/// The kind of a configured source, which decides how it is scraped
/// and whether its output is deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Plain-text weather endpoint; fetched with minimal headers, never deduped.
    Weather,
    /// RSS or Atom feed; self-heals through the feed resolver when broken.
    Rss,
    /// Plain or JS-gated HTML listing page scraped with CSS selectors.
    Html,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Weather => "weather",
            SourceType::Rss => "rss",
            SourceType::Html => "html",
        }
    }
}

/// One article extracted from a source.
///
/// Invariant: `title` is never empty. Items without a usable title are
/// dropped at construction time, before they reach a [`SourceGroup`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArticleItem {
    /// Headline as published by the source.
    pub title: String,
    /// Link to the article page; canonicalized before use as a dedup key.
    pub link: String,
    /// Extracted or feed-provided body text; `None` when nothing was usable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Publication timestamp as reported by the source (RFC3339 when parseable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Supplementary articles attached by the enrichment fallback.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedArticle>,
    /// Whether the item was classified as having too little usable text.
    #[serde(default)]
    pub thin: bool,
}

impl ArticleItem {
    /// Build an item, refusing empty titles.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Option<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return None;
        }
        Some(Self {
            title: title.trim().to_string(),
            link: link.into(),
            summary: None,
            published: None,
            related: Vec::new(),
            thin: false,
        })
    }

    /// Title and summary concatenated, for marker scans.
    pub fn search_text(&self) -> String {
        match &self.summary {
            Some(s) => format!("{} {}", self.title, s),
            None => self.title.clone(),
        }
    }
}

/// Supplementary article fetched by the enrichment fallback for a thin item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelatedArticle {
    pub title: String,
    pub link: String,
    pub text: String,
}

/// Everything one configured source produced in one pipeline run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceGroup {
    /// Source name from the configuration.
    pub source: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
    /// Ordering weight from the configuration; lower sorts first.
    pub priority: i32,
    pub items: Vec<ArticleItem>,
    /// Items successfully built before dedup filtering.
    pub scraped_count: usize,
    /// Items kept despite being classified thin.
    pub thin_items: usize,
    /// Items dropped in strict mode for lacking extractable content.
    pub skipped_thin_items: usize,
    /// Wire format the source actually spoke ("rss", "atom", "html", "text").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// HTTP status of the primary fetch, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Soft failure description; the group carries zero items when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceGroup {
    pub fn new(source: impl Into<String>, kind: SourceType, priority: i32) -> Self {
        Self {
            source: source.into(),
            kind,
            priority,
            items: Vec::new(),
            scraped_count: 0,
            thin_items: 0,
            skipped_thin_items: 0,
            format: None,
            http_status: None,
            error: None,
        }
    }

    /// Mark the group as soft-failed with no items.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
