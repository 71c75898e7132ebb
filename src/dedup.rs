//! URL canonicalization, title fingerprinting, and the repeat filter.
//!
//! A story counts as a repeat when either its canonical link or its title
//! fingerprint was seen within the dedup window. Fingerprints are
//! order-independent sorted token sets, so paraphrased headlines
//! ("Klimatkris i Sverige nu" vs "Nu Sverige i klimatkris") collide on
//! purpose. Follow-up stories (updates, verdicts, charges) are let
//! through even when they repeat.

use crate::history::HistoryStore;
use crate::models::{SourceGroup, SourceType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

const FINGERPRINT_MAX_TOKENS: usize = 12;
const FINGERPRINT_MIN_TOKEN_CHARS: usize = 4;

/// Query parameters that only track, never identify content.
fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || matches!(k.as_str(), "fbclid" | "gclid" | "mc_cid" | "mc_eid")
}

/// Normalize a URL for use as a dedup key.
///
/// Drops tracking parameters, the fragment, and a trailing slash. Returns
/// `""` for empty input and the trimmed input verbatim when parsing fails:
/// an unparseable link still keys consistently against itself.
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&kept);
    }
    url.set_fragment(None);

    let mut out = url.to_string();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Swedish
        "inte", "från", "efter", "över", "under", "mellan", "genom", "många",
        "därför", "sedan", "skulle", "kommer", "finns", "redan", "enligt",
        "säger", "också", "detta", "denna", "vilket", "blivit", "blir",
        // English
        "with", "that", "this", "from", "have", "will", "been", "were",
        "their", "would", "into", "only", "also", "says", "after", "over",
        "about", "when", "what", "where", "which", "more", "most",
    ]
    .into_iter()
    .collect()
});

static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s-]+").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Build an order-independent fingerprint of a headline.
///
/// Lowercase, strip punctuation (hyphens and accented letters survive),
/// tokenize, drop stopwords plus short or purely numeric tokens, dedupe,
/// sort, cap at 12 tokens. Returns `""` when nothing survives, which the
/// filter reads as "unusable for dedup".
pub fn title_fingerprint(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = RE_PUNCT.replace_all(&lower, " ");
    let collapsed = RE_WS.replace_all(stripped.trim(), " ");

    let mut tokens: Vec<&str> = collapsed
        .split(' ')
        .filter(|t| {
            t.chars().count() >= FINGERPRINT_MIN_TOKEN_CHARS
                && !t.chars().all(|c| c.is_ascii_digit())
                && !STOPWORDS.contains(t)
        })
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens.truncate(FINGERPRINT_MAX_TOKENS);
    tokens.join(" ")
}

/// Markers that flag a story as a follow-up to earlier reporting.
static FOLLOWUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(uppdater\w*|uppföljning\w*|rättegång\w*|dom|domen|dömd\w*|döms|åtal\w*|häktad\w*|häktas|gripen|grips|frias|friad|update[sd]?|verdict|charged|follow.?up)\b",
    )
    .unwrap()
});

pub fn is_followup(text: &str) -> bool {
    FOLLOWUP_RE.is_match(text)
}

/// Per-source dedup accounting, reported but never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DedupeStats {
    pub source: String,
    pub items_in: usize,
    pub items_out: usize,
    pub skipped_repeats: usize,
    /// The anti-starvation floor fired: dedup would have emptied the group.
    pub floor_kept: bool,
}

/// History keys for one item: canonical link plus title fingerprint.
pub fn item_keys(title: &str, link: &str) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    let canonical = canonicalize_url(link);
    if !canonical.is_empty() {
        keys.push(format!("url:{canonical}"));
    }
    let fingerprint = title_fingerprint(title);
    if !fingerprint.is_empty() {
        keys.push(format!("title:{fingerprint}"));
    }
    keys
}

/// Filter repeats out of one group against the history store.
///
/// Weather groups pass through untouched. For the rest: an item whose link
/// or fingerprint was seen within the window is dropped unless it carries a
/// follow-up marker. If filtering would empty a group that had input, the
/// first original item is forced through (anti-starvation floor). Keys of
/// all kept items are collected into `keys_to_mark`; marking happens once
/// at the end of the run, not per group, so a strict-mode re-run does not
/// dedup against its own first pass.
pub fn filter_group(
    group: &mut SourceGroup,
    history: &HistoryStore,
    window_days: i64,
    keys_to_mark: &mut Vec<String>,
) -> DedupeStats {
    let items_in = group.items.len();
    let mut stats = DedupeStats {
        source: group.source.clone(),
        items_in,
        items_out: items_in,
        skipped_repeats: 0,
        floor_kept: false,
    };

    if group.kind == SourceType::Weather {
        return stats;
    }

    let originals = std::mem::take(&mut group.items);
    let mut kept = Vec::with_capacity(originals.len());

    for item in &originals {
        let keys = item_keys(&item.title, &item.link);
        let repeat = keys
            .iter()
            .any(|k| history.seen_within_days(k, window_days));

        if repeat && !is_followup(&item.search_text()) {
            stats.skipped_repeats += 1;
            debug!(source = %group.source, title = %item.title, "skipping repeat");
            continue;
        }
        kept.push(item.clone());
    }

    if kept.is_empty() && items_in > 0 {
        // Every candidate was a repeat; force the first one through rather
        // than hand downstream an empty rundown for a live source.
        // skipped_repeats still counts it: it IS a repeat, just a kept one.
        stats.floor_kept = true;
        kept.push(originals[0].clone());
        info!(source = %group.source, "dedup emptied group, keeping first item as floor");
    }

    for item in &kept {
        keys_to_mark.extend(item_keys(&item.title, &item.link));
    }

    stats.items_out = kept.len();
    group.items = kept;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleItem;

    #[test]
    fn canonicalize_strips_tracking_params() {
        assert_eq!(
            canonicalize_url("https://a.com/x?utm_source=y&id=1"),
            "https://a.com/x?id=1"
        );
        assert_eq!(
            canonicalize_url("https://a.com/x?fbclid=abc&gclid=def"),
            "https://a.com/x"
        );
    }

    #[test]
    fn canonicalize_drops_fragment_and_trailing_slash() {
        assert_eq!(
            canonicalize_url("https://a.com/artikel/#kommentarer"),
            "https://a.com/artikel"
        );
        assert_eq!(canonicalize_url("https://a.com/"), "https://a.com");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let urls = [
            "https://a.com/x?utm_source=y&id=1",
            "https://a.com/nyheter/",
            "not a url at all",
            "",
        ];
        for u in urls {
            let once = canonicalize_url(u);
            assert_eq!(canonicalize_url(&once), once, "not idempotent for {u:?}");
        }
    }

    #[test]
    fn canonicalize_handles_garbage() {
        assert_eq!(canonicalize_url(""), "");
        assert_eq!(canonicalize_url("  hej hopp  "), "hej hopp");
    }

    #[test]
    fn fingerprint_is_order_insensitive() {
        assert_eq!(
            title_fingerprint("Klimatkris i Sverige nu"),
            title_fingerprint("Nu Sverige i klimatkris")
        );
        assert_ne!(title_fingerprint("Klimatkris i Sverige"), "");
    }

    #[test]
    fn fingerprint_drops_numbers_and_short_tokens() {
        let fp = title_fingerprint("Tre män åtalas 2025 i mål om 14 000 kronor");
        assert!(!fp.contains("2025"));
        assert!(!fp.contains("tre"));
        assert!(fp.contains("åtalas"));
        assert!(fp.contains("kronor"));
    }

    #[test]
    fn fingerprint_keeps_accents_and_hyphens() {
        let fp = title_fingerprint("E4-avstängning vid Örnsköldsvik");
        assert!(fp.contains("örnsköldsvik"));
        assert!(fp.contains("e4-avstängning"));
    }

    #[test]
    fn fingerprint_empty_when_nothing_survives() {
        assert_eq!(title_fingerprint("i en då 22"), "");
        assert_eq!(title_fingerprint(""), "");
    }

    #[test]
    fn fingerprint_caps_tokens() {
        let long = "alpha bravo charlie delta echo foxtrot golfhotel india juliett kilot lima mike november oscar papa quebec";
        let fp = title_fingerprint(long);
        assert!(fp.split(' ').count() <= 12);
    }

    #[test]
    fn followup_markers_match_word_forms() {
        assert!(is_followup("Uppdaterad: branden släckt"));
        assert!(is_followup("Rättegången inleds på måndag"));
        assert!(is_followup("Mannen döms till fängelse"));
        assert!(is_followup("Åtal väcks mot kommunalrådet"));
        assert!(!is_followup("Kommunen bygger ny skola"));
        // "dom" must not fire inside unrelated words
        assert!(!is_followup("Ungdomarna vann tävlingen"));
    }

    fn group_with(titles: &[&str]) -> SourceGroup {
        let mut group = SourceGroup::new("Test", SourceType::Rss, 1);
        for (i, t) in titles.iter().enumerate() {
            group
                .items
                .push(ArticleItem::new(*t, format!("https://ex.se/{i}")).unwrap());
        }
        group.scraped_count = group.items.len();
        group
    }

    #[test]
    fn repeats_within_window_are_dropped() {
        let mut history = HistoryStore::in_memory();
        let mut first = group_with(&["Storbrand i hamnen", "Valet närmar sig snabbt"]);
        let mut keys = Vec::new();
        let stats = filter_group(&mut first, &history, 21, &mut keys);
        assert_eq!(stats.items_out, 2);
        history.mark_seen(&keys);

        let mut second = group_with(&["Storbrand i hamnen", "Helt annan nyhet idag"]);
        let mut keys2 = Vec::new();
        let stats2 = filter_group(&mut second, &history, 21, &mut keys2);
        assert_eq!(stats2.skipped_repeats, 1);
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].title, "Helt annan nyhet idag");
    }

    #[test]
    fn identical_rerun_skips_everything_but_floor() {
        let mut history = HistoryStore::in_memory();
        let mut first = group_with(&["Nyhet ett händer", "Nyhet två händer"]);
        let mut keys = Vec::new();
        filter_group(&mut first, &history, 21, &mut keys);
        history.mark_seen(&keys);

        // same source an hour later with identical items
        let mut rerun = group_with(&["Nyhet ett händer", "Nyhet två händer"]);
        let mut keys2 = Vec::new();
        let stats = filter_group(&mut rerun, &history, 21, &mut keys2);
        assert!(stats.floor_kept);
        assert_eq!(stats.items_out, 1);
        // every input was a detected repeat, floor-kept or not
        assert_eq!(stats.skipped_repeats, stats.items_in);
        // never empty for a source that had input
        assert!(!rerun.items.is_empty());
    }

    #[test]
    fn followup_survives_dedup() {
        let mut history = HistoryStore::in_memory();
        let mut first = group_with(&["Misstänkt mordbrand utreds vidare"]);
        let mut keys = Vec::new();
        filter_group(&mut first, &history, 21, &mut keys);
        history.mark_seen(&keys);

        let mut second = group_with(&["Misstänkt mordbrand utreds vidare", "Annan sak hänt"]);
        second.items[0].summary = Some("Åtal väntas inom kort.".to_string());
        let mut keys2 = Vec::new();
        let stats = filter_group(&mut second, &history, 21, &mut keys2);
        assert_eq!(stats.skipped_repeats, 0);
        assert_eq!(second.items.len(), 2);
    }

    #[test]
    fn weather_passes_through() {
        let mut history = HistoryStore::in_memory();
        let mut group = SourceGroup::new("Vädret", SourceType::Weather, 50);
        group
            .items
            .push(ArticleItem::new("Vädret", "https://wttr.in/Stockholm").unwrap());
        let mut keys = Vec::new();
        let stats = filter_group(&mut group, &history, 21, &mut keys);
        assert_eq!(stats.items_out, 1);
        assert!(keys.is_empty());

        // run again: still not filtered
        history.mark_seen(&[format!("url:{}", canonicalize_url("https://wttr.in/Stockholm"))]);
        let stats2 = filter_group(&mut group, &history, 21, &mut keys);
        assert_eq!(stats2.items_out, 1);
    }
}
