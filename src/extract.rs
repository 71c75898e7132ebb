//! Best-effort main-content extraction from article pages.
//!
//! No two Swedish local-news sites mark up their article bodies the same
//! way, so extraction is a gauntlet rather than a parser: strip junk
//! containers, walk a prioritized list of structural selectors, and fall
//! back to harvesting bare paragraphs. The function returns `""` when
//! nothing usable survives; the caller decides whether that makes an item
//! thin or, in strict mode, dead.

use crate::fetch::Fetcher;
use crate::models::SourceType;
use crate::utils::collapse_ws;
use once_cell::sync::Lazy;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

const MAX_CONTENT_CHARS: usize = 5000;
const MIN_CANDIDATE_CHARS: usize = 100;
const MIN_PARAGRAPH_CHARS: usize = 30;

/// Structural selectors in priority order; the first one that yields a
/// surviving candidate wins.
const CONTENT_SELECTORS: &[&str] = &[
    ".article-body",
    ".entry-content",
    ".post-content",
    ".story-body",
    "article",
    "main",
];

/// Containers whose text is never article content.
const JUNK_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form", "noscript", "iframe",
];

/// Phrases that mark a text block as navigation or comment boilerplate.
static BOILERPLATE_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "lämna en kommentar",
        "leave a comment",
        "din e-postadress kommer inte publiceras",
        "your email address will not be published",
        "prenumerera på vårt nyhetsbrev",
        "subscribe to our newsletter",
        "alla rättigheter förbehållna",
        "all rights reserved",
        "logga in för att kommentera",
        "relaterade artiklar",
        "fler nyheter från",
        "dela på facebook",
        "cookie",
    ]
});

fn is_boilerplate(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOILERPLATE_PHRASES.iter().any(|p| lower.contains(p))
}

fn is_junk_element(el: &Element) -> bool {
    if JUNK_TAGS.contains(&el.name()) {
        return true;
    }
    // comment/respond widgets hide under generic divs
    let classish = el
        .classes()
        .chain(el.id())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    classish.contains("comment") || classish.contains("respond")
}

/// Collect text under `root`, skipping junk subtrees.
fn text_excluding_junk(root: ElementRef) -> String {
    let mut out = String::new();
    let mut stack: Vec<_> = root.children().rev().collect();
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(t) => {
                out.push_str(&t.text);
                out.push(' ');
            }
            Node::Element(el) => {
                if is_junk_element(el) {
                    continue;
                }
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }
    out
}

fn cap_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        s
    } else {
        s.chars().take(max).collect()
    }
}

/// Extract the main article text from an HTML document.
///
/// Tries the structural selectors in order; within the winning selector the
/// longest surviving candidate is kept. Falls back to concatenating all
/// paragraphs over 30 chars. Returns `""` when nothing usable is found.
pub fn extract_content(html: &str) -> String {
    let doc = Html::parse_document(html);

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let mut best: Option<String> = None;
        for element in doc.select(&selector) {
            let text = collapse_ws(&text_excluding_junk(element));
            if text.chars().count() < MIN_CANDIDATE_CHARS || is_boilerplate(&text) {
                continue;
            }
            if best.as_ref().is_none_or(|b| text.len() > b.len()) {
                best = Some(text);
            }
        }
        if let Some(text) = best {
            debug!(selector = selector_str, chars = text.len(), "content candidate won");
            return cap_chars(text, MAX_CONTENT_CHARS);
        }
    }

    // Fallback: harvest bare paragraphs.
    let p = Selector::parse("p").expect("static selector");
    let paragraphs: Vec<String> = doc
        .select(&p)
        .map(|el| collapse_ws(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| t.chars().count() > MIN_PARAGRAPH_CHARS && !is_boilerplate(t))
        .collect();
    if paragraphs.is_empty() {
        return String::new();
    }
    cap_chars(paragraphs.join("\n\n"), MAX_CONTENT_CHARS)
}

/// Fetch an article page and extract its text; `""` on any failure.
pub async fn extract_from_url(fetcher: &Fetcher, url: &str) -> String {
    let result = fetcher.fetch_with_meta(url, SourceType::Html).await;
    if !result.ok() {
        debug!(%url, status = ?result.status, error = ?result.error, "article fetch unusable");
        return String::new();
    }
    extract_content(&result.text)
}
