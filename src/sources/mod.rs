//! Per-source-type scrapers.
//!
//! One submodule per kind of configured origin, each following the same
//! contract: take the run context and one [`SourceConfig`], return a
//! [`SourceGroup`] (with the error carried on the group, never raised),
//! plus any feed-URL correction discovered along the way.
//!
//! | Kind | Module | Method |
//! |------|--------|--------|
//! | rss | [`rss`] | Feed fetch with self-healing, per-entry article extraction |
//! | html | [`html`] | Listing-page selector scrape, per-link article extraction |
//! | weather | [`weather`] | Minimal-header plain-text fetch, single item |

pub mod html;
pub mod rss;
pub mod weather;

use crate::config::SourceConfig;
use crate::models::{SourceGroup, SourceType};
use crate::pipeline::PipelineContext;
use crate::resolver::HealedFeed;

/// What scraping one source produced.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub group: SourceGroup,
    /// Feed-URL correction to apply to the side cache at run end.
    pub healed: Option<HealedFeed>,
}

impl ScrapeOutcome {
    pub fn plain(group: SourceGroup) -> Self {
        Self {
            group,
            healed: None,
        }
    }
}

/// Scrape one source according to its configured type.
pub async fn scrape_source(
    ctx: &PipelineContext,
    config: &SourceConfig,
    cached_feed_url: Option<&str>,
    strict: bool,
) -> ScrapeOutcome {
    match config.kind {
        SourceType::Rss => rss::scrape(ctx, config, cached_feed_url, strict).await,
        SourceType::Html => html::scrape(ctx, config, strict).await,
        SourceType::Weather => weather::scrape(ctx, config).await,
    }
}
