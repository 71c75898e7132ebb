//! Thin-item classification and the run-level escalation tally.
//!
//! An item is thin when its title or body text is too short to narrate
//! from. Individual thin items are tolerated; a run where most items come
//! back thin means the sources are serving teasers and the whole pass is
//! worth redoing in strict mode.

use crate::models::ArticleItem;

pub const THIN_TITLE_MIN_CHARS: usize = 12;
pub const THIN_SUMMARY_MIN_CHARS: usize = 320;

/// A thin item has a stub title, no summary, or a teaser-length summary.
pub fn is_thin(item: &ArticleItem) -> bool {
    if item.title.chars().count() < THIN_TITLE_MIN_CHARS {
        return true;
    }
    match &item.summary {
        None => true,
        Some(s) => s.chars().count() < THIN_SUMMARY_MIN_CHARS,
    }
}

/// Run-level accounting feeding the one-shot strict-mode escalation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinTally {
    /// Items the run attempted to build (kept + strict-dropped).
    pub attempted: usize,
    /// Items that came back thin or were dropped for lacking content.
    pub thin_or_skipped: usize,
}

impl ThinTally {
    pub fn add(&mut self, attempted: usize, thin_or_skipped: usize) {
        self.attempted += attempted;
        self.thin_or_skipped += thin_or_skipped;
    }

    pub fn ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.thin_or_skipped as f64 / self.attempted as f64
        }
    }

    /// Whether the tally justifies re-running the pass in strict mode.
    pub fn warrants_escalation(&self, min_items: usize, threshold: f64) -> bool {
        self.attempted > 0 && self.attempted >= min_items && self.ratio() >= threshold
    }
}
