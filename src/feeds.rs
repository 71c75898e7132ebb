//! RSS 2.0 and Atom parsing into a common entry shape.
//!
//! Feeds in the wild are sloppy: stray HTML entities in the XML, CDATA
//! titles, tag soup in descriptions. The parser scrubs the worst offenders
//! before handing the document to `quick_xml`'s serde deserializer, and
//! strips markup from summaries afterwards. Exotic dialects (RSS 1.0/RDF
//! and friends) are out of scope; a feed that fails both grammars is a
//! parse error the caller turns into resolver triggers or zero items.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;

/// Which grammar the document matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedFormat::Rss => "rss",
            FeedFormat::Atom => "atom",
        }
    }
}

/// One feed entry reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    /// RFC3339 when the source timestamp was parseable, otherwise verbatim.
    pub published: Option<String>,
}

/// A parsed feed: its format plus entries with non-empty titles and links.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub format: FeedFormat,
    pub entries: Vec<FeedEntry>,
}

// -- RSS 2.0 --------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

// -- Atom -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

/// Atom text constructs carry a `type` attribute; only the text matters here.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Parse a feed document, trying the grammar the document looks like.
///
/// The root-marker check matters: deserializing arbitrary HTML as Atom
/// "succeeds" with zero entries because unknown elements are ignored, so a
/// document has to announce itself as one of the grammars to be parsed at all.
pub fn parse_feed(body: &str) -> Result<ParsedFeed, Box<dyn Error>> {
    let scrubbed = scrub_entities(body);
    let has_rss = scrubbed.contains("<rss") || scrubbed.contains("<channel");
    let has_atom = scrubbed.contains("<feed");

    match (has_rss, has_atom) {
        (true, true) => parse_rss(&scrubbed).or_else(|_| parse_atom(&scrubbed)),
        (true, false) => parse_rss(&scrubbed),
        (false, true) => parse_atom(&scrubbed),
        (false, false) => Err("document does not look like RSS or Atom".into()),
    }
}

fn parse_rss(body: &str) -> Result<ParsedFeed, Box<dyn Error>> {
    let rss: Rss = quick_xml::de::from_str(body)?;
    let entries = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = clean_text(item.title.as_deref().unwrap_or_default());
            let link = item.link.map(|l| l.trim().to_string()).unwrap_or_default();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(FeedEntry {
                title,
                link,
                summary: non_empty(clean_text(item.description.as_deref().unwrap_or_default())),
                published: item.pub_date.as_deref().map(normalize_timestamp),
            })
        })
        .collect();
    Ok(ParsedFeed {
        format: FeedFormat::Rss,
        entries,
    })
}

fn parse_atom(body: &str) -> Result<ParsedFeed, Box<dyn Error>> {
    let feed: AtomFeed = quick_xml::de::from_str(body)?;
    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = clean_text(
                entry
                    .title
                    .as_ref()
                    .and_then(|t| t.value.as_deref())
                    .unwrap_or_default(),
            );
            let link = pick_atom_link(&entry.links).unwrap_or_default();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            // Prefer the short summary; fall back to inline content.
            let summary = entry
                .summary
                .as_ref()
                .and_then(|t| t.value.as_deref())
                .or_else(|| entry.content.as_ref().and_then(|t| t.value.as_deref()))
                .map(clean_text)
                .and_then(non_empty);
            let published = entry
                .published
                .as_deref()
                .or(entry.updated.as_deref())
                .map(normalize_timestamp);
            Some(FeedEntry {
                title,
                link,
                summary,
                published,
            })
        })
        .collect();
    Ok(ParsedFeed {
        format: FeedFormat::Atom,
        entries,
    })
}

/// `rel="alternate"` (or no rel) wins; self/edit links are bookkeeping.
fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.href.as_ref())
        .map(|h| h.trim().to_string())
}

/// HTML entities that are legal in HTML but not in XML; seen in real feeds.
fn scrub_entities(body: &str) -> String {
    body.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup, decode entities, collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let no_tags = RE_TAGS.replace_all(&decoded, " ");
    RE_WS.replace_all(no_tags.trim(), " ").to_string()
}

/// Normalize feed timestamps to RFC3339; keep verbatim when unparseable.
fn normalize_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return dt.to_rfc3339();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.to_rfc3339();
    }
    trimmed.to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Testkanal</title>
    <item>
      <title><![CDATA[Brand i centrala Uppsala &ndash; tre till sjukhus]]></title>
      <link>https://example.se/nyheter/brand-uppsala?utm_source=rss</link>
      <description>&lt;p&gt;Räddningstjänsten larmades vid 04-tiden.&lt;/p&gt;</description>
      <pubDate>Tue, 05 Aug 2025 04:31:00 +0200</pubDate>
    </item>
    <item>
      <title></title>
      <link>https://example.se/utan-rubrik</link>
    </item>
    <item>
      <title>Utan länk</title>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Testflöde</title>
  <entry>
    <title type="html">Tågstopp mellan Göteborg och Alingsås</title>
    <link rel="self" href="https://example.se/atom/1"/>
    <link rel="alternate" href="https://example.se/nyheter/tagstopp"/>
    <summary>Signalfel stoppar all trafik.</summary>
    <published>2025-08-05T06:12:00+02:00</published>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_and_drops_unusable() {
        let feed = parse_feed(RSS_SAMPLE).unwrap();
        assert_eq!(feed.format, FeedFormat::Rss);
        // entries without a title or a link never surface
        assert_eq!(feed.entries.len(), 1);

        let entry = &feed.entries[0];
        assert_eq!(entry.title, "Brand i centrala Uppsala - tre till sjukhus");
        assert_eq!(
            entry.summary.as_deref(),
            Some("Räddningstjänsten larmades vid 04-tiden.")
        );
    }

    #[test]
    fn rss_pubdate_normalized_to_rfc3339() {
        let feed = parse_feed(RSS_SAMPLE).unwrap();
        let published = feed.entries[0].published.as_deref().unwrap();
        assert!(published.starts_with("2025-08-05T04:31:00"));
    }

    #[test]
    fn parses_atom_entries_with_alternate_link() {
        let feed = parse_feed(ATOM_SAMPLE).unwrap();
        assert_eq!(feed.format, FeedFormat::Atom);
        assert_eq!(feed.entries.len(), 1);

        let entry = &feed.entries[0];
        assert_eq!(entry.title, "Tågstopp mellan Göteborg och Alingsås");
        assert_eq!(entry.link, "https://example.se/nyheter/tagstopp");
        assert_eq!(entry.summary.as_deref(), Some("Signalfel stoppar all trafik."));
    }

    #[test]
    fn html_document_is_a_parse_error() {
        let html = "<!DOCTYPE html><html><body><p>Inte ett flöde</p></body></html>";
        assert!(parse_feed(html).is_err());
    }

    #[test]
    fn clean_text_strips_tags_and_entities() {
        let raw = "<p>Polisen s&auml;ger att   <b>utredningen</b> forts&auml;tter</p>";
        assert_eq!(clean_text(raw), "Polisen säger att utredningen fortsätter");
    }

    #[test]
    fn timestamp_passthrough_when_unparseable() {
        assert_eq!(normalize_timestamp("igår kväll"), "igår kväll");
    }
}
