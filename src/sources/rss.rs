//! RSS/Atom source scraping.
//!
//! Feeds are the friendliest source type until they break: the URL rots,
//! the summary turns into a one-line teaser, or the whole feed starts
//! serving an HTML error page. This scraper leans on the resolver for
//! broken URLs and on the content extractor for teaser summaries, and
//! classifies whatever remains.

use crate::classify::{THIN_SUMMARY_MIN_CHARS, is_thin};
use crate::config::SourceConfig;
use crate::extract::extract_from_url;
use crate::models::{ArticleItem, SourceGroup};
use crate::pipeline::PipelineContext;
use crate::resolver::fetch_feed_with_healing;
use crate::sources::ScrapeOutcome;
use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

/// How many article pages are fetched at once for one source.
const ARTICLE_FETCH_CONCURRENCY: usize = 4;

#[instrument(level = "info", skip_all, fields(source = %config.name))]
pub async fn scrape(
    ctx: &PipelineContext,
    config: &SourceConfig,
    cached_feed_url: Option<&str>,
    strict: bool,
) -> ScrapeOutcome {
    let mut group = SourceGroup::new(&config.name, config.kind, config.priority);

    let resolved = match fetch_feed_with_healing(
        &ctx.fetcher,
        &config.name,
        &config.url,
        config.homepage.as_deref(),
        cached_feed_url,
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(source = %config.name, error = %e, "feed unusable");
            return ScrapeOutcome::plain(group.failed(e));
        }
    };

    group.format = Some(resolved.feed.format.as_str().to_string());
    group.http_status = resolved.http_status;
    debug!(
        feed_url = %resolved.url,
        entries = resolved.feed.entries.len(),
        healed = resolved.healed.is_some(),
        "feed resolved"
    );

    let candidates: Vec<ArticleItem> = resolved
        .feed
        .entries
        .into_iter()
        .take(config.max_items)
        .filter_map(|entry| {
            let mut item = ArticleItem::new(entry.title, entry.link)?;
            item.summary = entry.summary;
            item.published = entry.published;
            Some(item)
        })
        .collect();

    // Feed summaries are often teasers; fetch the article page for any item
    // whose summary is too short to narrate from.
    let filled: Vec<ArticleItem> = stream::iter(candidates)
        .map(|mut item| async move {
            let summary_chars = item
                .summary
                .as_deref()
                .map(|s| s.chars().count())
                .unwrap_or(0);
            if summary_chars < THIN_SUMMARY_MIN_CHARS {
                let text = extract_from_url(&ctx.fetcher, &item.link).await;
                if text.chars().count() > summary_chars {
                    debug!(title = %item.title, chars = text.len(), "summary upgraded from article page");
                    item.summary = Some(text);
                }
            }
            item
        })
        .buffered(ARTICLE_FETCH_CONCURRENCY)
        .collect()
        .await;

    for mut item in filled {
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

    ScrapeOutcome {
        group,
        healed: resolved.healed,
    }
}
