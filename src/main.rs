//! # nyhetssvep
//!
//! An ingestion pipeline that sweeps heterogeneous, unreliable news
//! sources (RSS/Atom feeds, plain HTML pages, a weather endpoint) into
//! a curated, deduplicated rundown for a downstream narration stage.
//!
//! ## Features
//!
//! - Concurrent bounded-timeout fetching; a hung source never blocks the rest
//! - Self-healing feed URLs: broken feeds are re-discovered from the homepage
//! - Best-effort article extraction with thin-item classification
//! - One-shot strict-mode escalation when a run comes back mostly teasers
//! - History-backed dedup with a follow-up exception and an anti-starvation floor
//! - Optional keyword-search enrichment of thin items
//!
//! ## Usage
//!
//! ```sh
//! nyhetssvep -c sources.yaml -o ./rundowns -s ./state
//! ```
//!
//! ## Architecture
//!
//! One run is one pass: scrape all enabled sources concurrently, maybe
//! escalate to a strict re-run, filter repeats against the persistent
//! history, enrich what stayed thin, and write the rundown JSON.

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod classify;
mod cli;
mod config;
mod dedup;
mod enrich;
mod extract;
mod feeds;
mod fetch;
mod history;
mod models;
mod outputs;
mod pipeline;
mod render;
mod resolver;
mod sources;
mod utils;

use cli::Cli;
use pipeline::PipelineContext;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("nyhetssvep starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output_dir, ?args.state_dir, strict = args.strict, "parsed CLI arguments");

    // Early checks: the output dir must be writable and the config readable;
    // these are the only errors that stop a run.
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(path = %args.output_dir, error = %e, "output directory is not writable");
        return Err(e);
    }
    if let Err(e) = ensure_writable_dir(&args.state_dir).await {
        error!(path = %args.state_dir, error = %e, "state directory is not writable");
        return Err(e);
    }

    let mut config = config::load_config(std::path::Path::new(&args.config))?;
    info!(
        sources = config.sources.len(),
        enabled = config.enabled_sources().len(),
        config_path = %args.config,
        "loaded configuration"
    );
    if args.strict {
        config.pipeline.require_article_content = true;
    }

    let ctx = PipelineContext::new(config, PathBuf::from(&args.state_dir));

    // ---- Run the sweep ----
    let run = pipeline::run(&ctx).await;

    for group in &run.groups {
        match &group.error {
            Some(error) => warn!(
                source = %group.source,
                kind = group.kind.as_str(),
                %error,
                "source failed"
            ),
            None => info!(
                source = %group.source,
                kind = group.kind.as_str(),
                items = group.items.len(),
                scraped = group.scraped_count,
                thin = group.thin_items,
                skipped = group.skipped_thin_items,
                "source done"
            ),
        }
    }
    for stats in &run.report.dedupe {
        if stats.skipped_repeats > 0 || stats.floor_kept {
            info!(
                source = %stats.source,
                items_in = stats.items_in,
                items_out = stats.items_out,
                skipped_repeats = stats.skipped_repeats,
                floor_kept = stats.floor_kept,
                "dedup summary"
            );
        }
    }

    // ---- Write rundown ----
    match outputs::json::write_rundown(&run.groups, &run.report, &args.output_dir).await {
        Ok(path) => info!(%path, "rundown written"),
        Err(e) => {
            error!(error = %e, "failed to write rundown");
            return Err(e);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        groups = run.groups.len(),
        strict = run.report.strict,
        escalated = run.report.escalated,
        "execution complete"
    );

    Ok(())
}
