//! Pluggable page rendering for JS-gated sources.
//!
//! Some listing pages assemble their markup client-side and serve an empty
//! shell to plain HTTP clients. Rendering those requires a headless
//! browser, which is an optional capability, not a dependency: the
//! pipeline is built against [`PageRenderer`] and ships with
//! [`DisabledRenderer`], which declines every page so callers fall back to
//! the raw fetched body.

use async_trait::async_trait;

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and return the settled DOM as HTML, or `None` when
    /// rendering is unavailable or failed. Must not error.
    async fn render(&self, url: &str) -> Option<String>;
}

/// The no-op renderer used when no headless browser is wired in.
#[derive(Debug, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl PageRenderer for DisabledRenderer {
    async fn render(&self, _url: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_renderer_declines() {
        let renderer = DisabledRenderer;
        assert!(renderer.render("https://example.se").await.is_none());
    }
}
