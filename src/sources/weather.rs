//! Weather endpoint scraping.
//!
//! Weather "sources" are plain-text endpoints in the style of wttr.in:
//! one GET with a bare user agent, one line or paragraph of forecast back.
//! The result becomes a single-item group that skips both thin
//! classification and dedup; a forecast is short and repeats daily by
//! nature.

use crate::config::SourceConfig;
use crate::models::{ArticleItem, SourceGroup, SourceType};
use crate::pipeline::PipelineContext;
use crate::sources::ScrapeOutcome;
use crate::utils::collapse_ws;
use tracing::{instrument, warn};

/// Forecast bodies longer than this are junk, not weather.
const MAX_FORECAST_CHARS: usize = 800;

#[instrument(level = "info", skip_all, fields(source = %config.name))]
pub async fn scrape(ctx: &PipelineContext, config: &SourceConfig) -> ScrapeOutcome {
    let mut group = SourceGroup::new(&config.name, config.kind, config.priority);
    group.format = Some("text".to_string());

    let result = ctx
        .fetcher
        .fetch_with_meta(&config.url, SourceType::Weather)
        .await;
    group.http_status = result.status;

    if !result.ok() {
        let error = result
            .error
            .unwrap_or_else(|| format!("HTTP {}", result.status.unwrap_or(0)));
        warn!(source = %config.name, %error, "weather endpoint unusable");
        return ScrapeOutcome::plain(group.failed(error));
    }

    let forecast = collapse_ws(&result.text);
    if forecast.is_empty() {
        return ScrapeOutcome::plain(group.failed("empty forecast body"));
    }
    let forecast: String = forecast.chars().take(MAX_FORECAST_CHARS).collect();

    if let Some(mut item) = ArticleItem::new(&config.name, &config.url) {
        item.summary = Some(forecast);
        group.items.push(item);
        group.scraped_count = 1;
    }

    ScrapeOutcome::plain(group)
}
