//! Configuration loading for sources and pipeline options.
//!
//! The whole pipeline is driven by one YAML document with two top-level
//! sections:
//!
//! ```yaml
//! sources:
//!   - name: SVT Nyheter
//!     url: https://www.svt.se/rss.xml
//!     type: rss
//!     priority: 1
//!     max_items: 5
//! pipeline:
//!   dedup_window_days: 21
//!   history_retention_days: 60
//! ```
//!
//! Source records are immutable for the duration of a run; when the feed
//! resolver discovers a replacement URL it persists the correction to a side
//! cache rather than touching the configuration.

use crate::models::SourceType;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;

/// One configured origin: an RSS/Atom feed, an HTML page, or a weather endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordering weight in the final rundown; lower sorts first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// CSS selector for headline links on an HTML listing page.
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Override for feed discovery; defaults to scheme+host of `url`.
    #[serde(default)]
    pub homepage: Option<String>,
}

/// Tunables for classification, enrichment, dedup, and history retention.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Force strict mode from the start: drop items lacking extractable content.
    pub require_article_content: bool,
    /// Thin-or-skipped ratio at which the run is re-executed in strict mode.
    pub thin_ratio_threshold: f64,
    /// Whether the thin-ratio escalation is armed at all.
    pub thin_ratio_auto_strict: bool,
    /// Minimum attempted items before the ratio is considered meaningful.
    pub thin_ratio_min_items: usize,
    pub enrichment_enabled: bool,
    pub enrichment_provider: String,
    /// Global cap on enriched items per run.
    pub enrichment_max_items: usize,
    pub enrichment_max_related_per_item: usize,
    /// Restrict enrichment search hits to one domain (e.g. "svt.se").
    pub enrichment_domain_restrict: Option<String>,
    /// Days after which history entries are forgotten entirely.
    pub history_retention_days: i64,
    /// Days during which a previously-seen story is suppressed.
    pub dedup_window_days: i64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            require_article_content: false,
            thin_ratio_threshold: 0.5,
            thin_ratio_auto_strict: true,
            thin_ratio_min_items: 8,
            enrichment_enabled: false,
            enrichment_provider: "google-news".to_string(),
            enrichment_max_items: 5,
            enrichment_max_related_per_item: 2,
            enrichment_domain_restrict: None,
            history_retention_days: 60,
            dedup_window_days: 21,
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub pipeline: PipelineOptions,
}

impl AppConfig {
    /// Sources that take part in a run, in configuration order.
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }
}

/// Read and parse the YAML configuration.
///
/// An unreadable or malformed config is the one startup error the binary
/// refuses to continue past; everything after this point soft-fails.
pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
    let config: AppConfig =
        serde_yaml::from_str(&raw).map_err(|e| format!("parsing config {}: {}", path.display(), e))?;
    Ok(config)
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i32 {
    100
}

fn default_max_items() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sources:
  - name: SVT Nyheter
    url: https://www.svt.se/rss.xml
    type: rss
    priority: 1
  - name: Lokal sida
    url: https://lokalt.example.se/nyheter
    type: html
    selector: "h2.teaser a"
    enabled: false
  - name: Vädret
    url: https://wttr.in/Stockholm?format=3
    type: weather
    priority: 50
pipeline:
  dedup_window_days: 14
  enrichment_enabled: true
"#;

    #[test]
    fn parses_sources_and_defaults() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 3);

        let svt = &config.sources[0];
        assert_eq!(svt.kind, SourceType::Rss);
        assert!(svt.enabled);
        assert_eq!(svt.priority, 1);
        assert_eq!(svt.max_items, 5);
        assert!(svt.selector.is_none());

        let local = &config.sources[1];
        assert!(!local.enabled);
        assert_eq!(local.selector.as_deref(), Some("h2.teaser a"));
        assert_eq!(local.priority, 100);
    }

    #[test]
    fn pipeline_options_merge_with_defaults() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.pipeline.dedup_window_days, 14);
        assert!(config.pipeline.enrichment_enabled);
        // untouched options keep their defaults
        assert_eq!(config.pipeline.history_retention_days, 60);
        assert_eq!(config.pipeline.thin_ratio_min_items, 8);
        assert!((config.pipeline.thin_ratio_threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_pipeline_section_is_fine() {
        let yaml = "sources: []\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.dedup_window_days, 21);
        assert!(!config.pipeline.require_article_content);
    }

    #[test]
    fn enabled_sources_filters_disabled() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let enabled = config.enabled_sources();
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|s| s.name != "Lokal sida"));
    }
}
