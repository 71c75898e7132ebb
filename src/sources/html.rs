//! HTML listing-page scraping.
//!
//! For sites without a working feed the pipeline scrapes the listing page
//! directly: pull headline links with the configured CSS selector (or a
//! set of generic defaults), then fetch and extract each article page.
//! JS-gated pages go through the pluggable renderer first; when rendering
//! is unavailable the raw fetched body is all there is.

use crate::classify::{THIN_SUMMARY_MIN_CHARS, is_thin};
use crate::config::SourceConfig;
use crate::extract::extract_from_url;
use crate::models::{ArticleItem, SourceGroup, SourceType};
use crate::pipeline::PipelineContext;
use crate::sources::ScrapeOutcome;
use crate::utils::collapse_ws;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};
use url::Url;

const ARTICLE_FETCH_CONCURRENCY: usize = 4;

/// Selectors tried when the source has none configured, most specific first.
const DEFAULT_ITEM_SELECTORS: &[&str] = &["article h2 a", "article a[href]", "h2 a", "h3 a"];

#[instrument(level = "info", skip_all, fields(source = %config.name))]
pub async fn scrape(ctx: &PipelineContext, config: &SourceConfig, strict: bool) -> ScrapeOutcome {
    let mut group = SourceGroup::new(&config.name, config.kind, config.priority);
    group.format = Some("html".to_string());

    // A JS-gated listing serves an empty shell to plain HTTP; prefer the
    // renderer when one is wired in.
    let body = match ctx.renderer.render(&config.url).await {
        Some(rendered) => {
            debug!(source = %config.name, "using rendered page");
            rendered
        }
        None => {
            let result = ctx.fetcher.fetch_with_meta(&config.url, SourceType::Html).await;
            group.http_status = result.status;
            if !result.ok() {
                let error = result
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", result.status.unwrap_or(0)));
                warn!(source = %config.name, %error, "listing page unusable");
                return ScrapeOutcome::plain(group.failed(error));
            }
            result.text
        }
    };

    let candidates = collect_headline_links(&body, &config.url, config.selector.as_deref());
    if candidates.is_empty() {
        warn!(source = %config.name, "no headline links found on listing page");
        return ScrapeOutcome::plain(group.failed("no headline links found"));
    }

    let items: Vec<ArticleItem> = stream::iter(candidates.into_iter().take(config.max_items))
        .map(|(title, link)| async move {
            let mut item = ArticleItem::new(title, link)?;
            let text = extract_from_url(&ctx.fetcher, &item.link).await;
            if !text.is_empty() {
                item.summary = Some(text);
            }
            Some(item)
        })
        .buffered(ARTICLE_FETCH_CONCURRENCY)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    for mut item in items {
        group.scraped_count += 1;
        let content_chars = item
            .summary
            .as_deref()
            .map(|s| s.chars().count())
            .unwrap_or(0);
        if strict && content_chars < THIN_SUMMARY_MIN_CHARS {
            group.skipped_thin_items += 1;
            debug!(title = %item.title, "strict mode: dropping item without extractable content");
            continue;
        }
        item.thin = is_thin(&item);
        if item.thin {
            group.thin_items += 1;
        }
        group.items.push(item);
    }

    ScrapeOutcome::plain(group)
}

/// Pull `(title, absolute_link)` pairs from a listing page.
///
/// The configured selector wins when it matches anything; otherwise the
/// generic defaults are tried in order. Links are deduplicated and
/// fragments-only or empty anchors dropped.
pub fn collect_headline_links(
    html: &str,
    base_url: &str,
    configured_selector: Option<&str>,
) -> Vec<(String, String)> {
    let doc = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    let mut selectors: Vec<&str> = Vec::new();
    if let Some(s) = configured_selector {
        selectors.push(s);
    }
    selectors.extend(DEFAULT_ITEM_SELECTORS);

    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            warn!(selector = selector_str, "invalid CSS selector");
            continue;
        };

        let inner_anchor = Selector::parse("a[href]").expect("static selector");
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for element in doc.select(&selector) {
            // the selector may point at the anchor itself or a container
            let anchor = if element.value().name() == "a" {
                Some(element)
            } else {
                element.select(&inner_anchor).next()
            };
            let Some(anchor) = anchor else { continue };
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let title = collapse_ws(&anchor.text().collect::<Vec<_>>().join(" "));
            if title.is_empty() {
                continue;
            }
            let link = match Url::parse(href) {
                Ok(abs) => abs.to_string(),
                Err(_) => match base.as_ref().and_then(|b| b.join(href).ok()) {
                    Some(abs) => abs.to_string(),
                    None => continue,
                },
            };
            if seen.insert(link.clone()) {
                links.push((title, link));
            }
        }

        if !links.is_empty() {
            return links;
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r##"<html><body>
        <article>
          <h2><a href="/nyheter/branden">Storbrand i industriområdet under natten</a></h2>
        </article>
        <article>
          <h2><a href="https://annan.se/artikel">Kommunen höjer skatten nästa år</a></h2>
        </article>
        <article>
          <h2><a href="/nyheter/branden">Storbrand i industriområdet under natten</a></h2>
        </article>
        <h3><a href="#top">Till toppen</a></h3>
    </body></html>"##;

    #[test]
    fn collects_and_dedupes_links() {
        let links = collect_headline_links(LISTING, "https://lokalt.se/nyheter", None);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].0, "Storbrand i industriområdet under natten");
        assert_eq!(links[0].1, "https://lokalt.se/nyheter/branden");
        assert_eq!(links[1].1, "https://annan.se/artikel");
    }

    #[test]
    fn configured_selector_wins() {
        let html = r#"<html><body>
            <div class="puff"><a href="/a">Puffrubrik som ska med</a></div>
            <h2><a href="/b">Annan rubrik</a></h2>
        </body></html>"#;
        let links = collect_headline_links(html, "https://lokalt.se", Some(".puff a"));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].1, "https://lokalt.se/a");
    }

    #[test]
    fn falls_back_when_configured_selector_matches_nothing() {
        let links = collect_headline_links(LISTING, "https://lokalt.se", Some(".finns-inte a"));
        assert!(!links.is_empty());
    }

    #[test]
    fn container_selector_finds_inner_anchor() {
        let html = r#"<div class="teaser"><span>Etikett</span>
            <a href="/artikel">Rubrik inne i container</a></div>"#;
        let links = collect_headline_links(html, "https://lokalt.se", Some(".teaser"));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "Rubrik inne i container");
        assert_eq!(links[0].1, "https://lokalt.se/artikel");
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(collect_headline_links("<html><body></body></html>", "https://x.se", None).is_empty());
    }
}
