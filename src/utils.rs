//! Utility functions for time classification, string normalization, and
//! file system checks.
//!
//! Helpers used throughout the pipeline:
//! - Edition naming for output files (morning/afternoon/evening)
//! - Whitespace normalization and log truncation
//! - Output directory validation

use chrono::{Local, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Classify current time into morning, afternoon, or evening.
///
/// Used to name the output edition:
/// - **Morning**: 00:00 - 08:00
/// - **Afternoon**: 08:00 - 16:00
/// - **Evening**: 16:00 - 24:00
pub fn time_of_day() -> String {
    let morning_high = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
    let afternoon_high = NaiveTime::from_hms_opt(16, 0, 0).unwrap();

    let tod = Local::now().time();
    let which = if tod < morning_high {
        "morning"
    } else if tod < afternoon_high {
        "afternoon"
    } else {
        "evening"
    };
    which.to_string()
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_ws(s: &str) -> String {
    RE_WS.replace_all(s.trim(), " ").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with a byte-count indicator
/// appended, so debug logs stay readable next to 5 kB article bodies.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} bytes)", head, s.len() - head.len())
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then probes it with a throwaway file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
