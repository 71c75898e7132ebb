//! Enrichment fallback for thin items.
//!
//! When a source only serves teasers, the pipeline can try to fill an item
//! out by searching a news-search feed for its headline and attaching the
//! extracted text of the best hits as related material. Everything here is
//! best-effort and bounded: a global per-run item budget, a per-item
//! related cap, and silent per-candidate failures. A dead search hit
//! never costs more than its own fetch.

use crate::config::PipelineOptions;
use crate::dedup::canonicalize_url;
use crate::extract::extract_from_url;
use crate::feeds::parse_feed;
use crate::fetch::Fetcher;
use crate::models::{RelatedArticle, SourceGroup, SourceType};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

/// Minimum extracted length for a search hit to count as enrichment.
const MIN_RELATED_CHARS: usize = 450;
const QUERY_MAX_TOKENS: usize = 10;

static RE_QUERY_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").unwrap());

/// Search-grade stopwords: glue words that dilute a keyword query.
static QUERY_STOPWORDS: &[&str] = &[
    "och", "att", "det", "som", "för", "med", "den", "till", "har", "inte", "ett", "om", "men",
    "var", "sig", "från", "vid", "efter", "under", "över", "på", "av", "en", "nu", "the", "and",
    "for", "with", "that", "this", "from", "have", "will", "not", "after",
];

/// Reduce a headline to a conservative keyword query.
pub fn build_search_query(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = RE_QUERY_PUNCT.replace_all(&lower, " ");
    stripped
        .split_whitespace()
        .filter(|t| t.chars().count() >= 3 && !QUERY_STOPWORDS.contains(t))
        .take(QUERY_MAX_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Google News RSS search URL for a query, optionally domain-restricted.
pub fn google_news_url(query: &str, domain_restrict: Option<&str>) -> String {
    let q = match domain_restrict {
        Some(domain) => format!("{query} site:{domain}"),
        None => query.to_string(),
    };
    format!(
        "https://news.google.com/rss/search?q={}&hl=sv&gl=SE&ceid=SE:sv",
        urlencoding::encode(&q)
    )
}

/// Enrich thin items across all groups, within the configured budgets.
#[instrument(level = "info", skip_all)]
pub async fn enrich_groups(fetcher: &Fetcher, options: &PipelineOptions, groups: &mut [SourceGroup]) {
    if !options.enrichment_enabled {
        return;
    }
    if options.enrichment_provider != "google-news" {
        warn!(
            provider = %options.enrichment_provider,
            "unknown enrichment provider, skipping enrichment"
        );
        return;
    }

    let mut budget = options.enrichment_max_items;
    let mut enriched = 0usize;

    'groups: for group in groups.iter_mut() {
        if group.kind == SourceType::Weather {
            continue;
        }
        for item in group.items.iter_mut() {
            if budget == 0 {
                break 'groups;
            }
            if !item.thin || item.related.len() >= options.enrichment_max_related_per_item {
                continue;
            }
            budget -= 1;

            let query = build_search_query(&item.title);
            if query.is_empty() {
                continue;
            }
            let before = item.related.len();
            enrich_item(fetcher, options, &query, item).await;
            if item.related.len() > before {
                enriched += 1;
            }
        }
    }

    if enriched > 0 {
        info!(enriched, "enrichment attached related material");
    }
}

/// Search for one item and attach qualifying hits. All failures are silent.
async fn enrich_item(
    fetcher: &Fetcher,
    options: &PipelineOptions,
    query: &str,
    item: &mut crate::models::ArticleItem,
) {
    let url = google_news_url(query, options.enrichment_domain_restrict.as_deref());
    let result = fetcher.fetch_with_meta(&url, SourceType::Rss).await;
    if !result.ok() {
        debug!(%query, "enrichment search fetch failed");
        return;
    }
    let Ok(feed) = parse_feed(&result.text) else {
        debug!(%query, "enrichment search feed unparseable");
        return;
    };

    let own_link = canonicalize_url(&item.link);
    // probe a few more hits than we can attach; some will be dead ends
    let probe_cap = options.enrichment_max_related_per_item * 2;

    for entry in feed.entries.into_iter().take(probe_cap.max(2)) {
        if item.related.len() >= options.enrichment_max_related_per_item {
            break;
        }
        if canonicalize_url(&entry.link) == own_link {
            continue;
        }
        let text = extract_from_url(fetcher, &entry.link).await;
        if text.chars().count() < MIN_RELATED_CHARS {
            continue;
        }
        debug!(
            title = %entry.title,
            preview = %truncate_for_log(&text, 120),
            "attaching related article"
        );
        item.related.push(RelatedArticle {
            title: entry.title,
            link: entry.link,
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_drops_punctuation_and_stopwords() {
        let q = build_search_query("Kraftig brand i villa – polisen: \"mycket omfattande\"");
        assert_eq!(q, "kraftig brand villa polisen mycket omfattande");
    }

    #[test]
    fn query_caps_tokens() {
        let title = "ord1x ord2x ord3x ord4x ord5x ord6x ord7x ord8x ord9x ord10x ord11x ord12x";
        let q = build_search_query(title);
        assert_eq!(q.split(' ').count(), QUERY_MAX_TOKENS);
    }

    #[test]
    fn query_empty_for_stopword_titles() {
        assert_eq!(build_search_query("och att det"), "");
    }

    #[test]
    fn search_url_encodes_query() {
        let url = google_news_url("brand åkersberga", None);
        assert!(url.starts_with("https://news.google.com/rss/search?q="));
        assert!(url.contains("brand%20%C3%A5kersberga"));
        assert!(url.ends_with("&hl=sv&gl=SE&ceid=SE:sv"));
    }

    #[test]
    fn search_url_domain_restrict() {
        let url = google_news_url("tågstopp", Some("svt.se"));
        assert!(url.contains("site%3Asvt.se"));
    }
}
