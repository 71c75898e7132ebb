//! Run orchestration: concurrent scraping, escalation, dedup, enrichment.
//!
//! One call to [`run`] is one complete sweep: every enabled source is
//! scraped concurrently, the aggregate is measured for thinness and
//! possibly re-scraped once in strict mode, repeats are filtered against
//! the history store, thin survivors are enriched, and the groups come
//! back sorted by priority with a [`RunReport`] of what happened.
//!
//! All shared run state lives in the [`PipelineContext`] built once per
//! run; there are no process-wide singletons. The history store and
//! feed-URL cache are read before the first fetch and written after the
//! last, so concurrent scrapes never touch disk.

use crate::classify::ThinTally;
use crate::config::AppConfig;
use crate::dedup::{DedupeStats, filter_group};
use crate::enrich::enrich_groups;
use crate::fetch::Fetcher;
use crate::history::HistoryStore;
use crate::models::{SourceGroup, SourceType};
use crate::render::{DisabledRenderer, PageRenderer};
use crate::resolver::{FeedCache, HealedFeed};
use crate::sources::scrape_source;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// How many sources are scraped at once.
const SOURCE_CONCURRENCY: usize = 6;

const HISTORY_FILE: &str = "seen_history.json";
const FEED_CACHE_FILE: &str = "feed_urls.json";

/// Everything a run shares across components, constructed once per run.
pub struct PipelineContext {
    pub config: AppConfig,
    pub fetcher: Fetcher,
    pub renderer: Box<dyn PageRenderer>,
    pub state_dir: PathBuf,
}

impl PipelineContext {
    /// Context with the default (disabled) renderer.
    pub fn new(config: AppConfig, state_dir: PathBuf) -> Self {
        Self {
            config,
            fetcher: Fetcher::new(),
            renderer: Box::new(DisabledRenderer),
            state_dir,
        }
    }
}

/// Per-run summary statistics, serialized alongside the groups.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Whether the final pass ran in strict mode.
    pub strict: bool,
    /// Whether the thin-ratio escalation re-ran the whole pass.
    pub escalated: bool,
    pub thin_ratio: f64,
    pub attempted_items: usize,
    pub dedupe: Vec<DedupeStats>,
}

/// The outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    pub groups: Vec<SourceGroup>,
    pub report: RunReport,
}

/// Execute one full sweep over all enabled sources.
#[instrument(level = "info", skip_all)]
pub async fn run(ctx: &PipelineContext) -> PipelineRun {
    let options = &ctx.config.pipeline;

    let mut history = HistoryStore::load(&ctx.state_dir.join(HISTORY_FILE));
    history.prune(options.history_retention_days);
    let mut feed_cache = FeedCache::load(&ctx.state_dir.join(FEED_CACHE_FILE));

    let mut strict = options.require_article_content;
    let (mut groups, mut healed, mut tally) = run_pass(ctx, &feed_cache, strict).await;

    let mut escalated = false;
    if !strict
        && options.thin_ratio_auto_strict
        && tally.warrants_escalation(options.thin_ratio_min_items, options.thin_ratio_threshold)
    {
        warn!(
            ratio = tally.ratio(),
            attempted = tally.attempted,
            "thin ratio over threshold, re-running in strict mode"
        );
        strict = true;
        escalated = true;
        let (strict_groups, strict_healed, strict_tally) =
            run_pass(ctx, &feed_cache, strict).await;
        groups = strict_groups;
        healed.extend(strict_healed);
        tally = strict_tally;
    }

    // Dedup reads history without marking, so the strict re-run above could
    // not have deduplicated against its own first pass. Keys are marked once
    // here, for the items that actually survived.
    let mut keys_to_mark = Vec::new();
    let mut dedupe_stats = Vec::with_capacity(groups.len());
    for group in groups.iter_mut() {
        dedupe_stats.push(filter_group(
            group,
            &history,
            options.dedup_window_days,
            &mut keys_to_mark,
        ));
    }

    enrich_groups(&ctx.fetcher, options, &mut groups).await;

    sort_groups(&mut groups);

    history.mark_seen(&keys_to_mark);
    if let Err(e) = history.save() {
        warn!(error = %e, "history save failed, next run will see repeats as new");
    }
    for heal in &healed {
        feed_cache.record(&heal.source, heal);
    }
    if let Err(e) = feed_cache.save() {
        warn!(error = %e, "feed cache save failed");
    }

    let total_items: usize = groups.iter().map(|g| g.items.len()).sum();
    info!(
        groups = groups.len(),
        items = total_items,
        strict,
        escalated,
        thin_ratio = tally.ratio(),
        "run complete"
    );

    PipelineRun {
        groups,
        report: RunReport {
            strict,
            escalated,
            thin_ratio: tally.ratio(),
            attempted_items: tally.attempted,
            dedupe: dedupe_stats,
        },
    }
}

/// One concurrent scrape of every enabled source.
async fn run_pass(
    ctx: &PipelineContext,
    feed_cache: &FeedCache,
    strict: bool,
) -> (Vec<SourceGroup>, Vec<HealedFeed>, ThinTally) {
    let sources = ctx.config.enabled_sources();
    info!(sources = sources.len(), strict, "starting scrape pass");

    let outcomes: Vec<_> = stream::iter(sources)
        .map(|config| scrape_source(ctx, config, feed_cache.resolved_url(&config.name), strict))
        .buffer_unordered(SOURCE_CONCURRENCY)
        .collect()
        .await;

    let mut groups = Vec::with_capacity(outcomes.len());
    let mut healed = Vec::new();
    let mut tally = ThinTally::default();

    for outcome in outcomes {
        let group = outcome.group;
        // weather items are never classified, so they can't skew the ratio
        if group.kind != SourceType::Weather {
            tally.add(
                group.scraped_count,
                group.thin_items + group.skipped_thin_items,
            );
        }
        if let Some(heal) = outcome.healed {
            healed.push(heal);
        }
        groups.push(group);
    }

    (groups, healed, tally)
}

/// Priority order for the final rundown; name breaks ties deterministically.
fn sort_groups(groups: &mut [SourceGroup]) {
    groups.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.source.cmp(&b.source))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineOptions;

    fn group(name: &str, priority: i32) -> SourceGroup {
        SourceGroup::new(name, SourceType::Rss, priority)
    }

    #[test]
    fn groups_sort_by_priority_then_name() {
        let mut groups = vec![group("B", 2), group("C", 1), group("A", 2)];
        sort_groups(&mut groups);
        let order: Vec<&str> = groups.iter().map(|g| g.source.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn empty_config_runs_clean() {
        let state_dir = std::env::temp_dir().join(format!(
            "nyhetssvep-pipeline-test-{}",
            std::process::id()
        ));
        let config = AppConfig {
            sources: Vec::new(),
            pipeline: PipelineOptions::default(),
        };
        let ctx = PipelineContext::new(config, state_dir.clone());

        let run = run(&ctx).await;
        assert!(run.groups.is_empty());
        assert!(!run.report.escalated);
        assert_eq!(run.report.attempted_items, 0);
        // state files were written on the way out
        assert!(state_dir.join(HISTORY_FILE).exists());

        let _ = std::fs::remove_dir_all(&state_dir);
    }
}
