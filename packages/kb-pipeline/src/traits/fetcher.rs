//! Page fetch capability.
//!
//! A `PageFetcher` renders a page (running scripts where the backend can)
//! and hands back markdown plus optional HTML. Discovery is exposed as a
//! separate `map` call so the orchestrator can apply its own filtering
//! and prioritization to the URL set.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kb_pipeline::traits::fetcher::{PageFetcher, ScrapeOptions, MapOptions};
//!
//! let page = fetcher.scrape("https://www.epassport.gov.bd", &ScrapeOptions::default()).await?;
//! let urls = fetcher.map("https://www.epassport.gov.bd", &MapOptions::default()).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::FetchResult;

/// Output format requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Format {
    Markdown,
    Html,
    RawHtml,
}

/// Options for a single scrape.
///
/// Field names serialize in the backend's camelCase wire form so the
/// same struct is posted as-is and patched from override files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    pub formats: Vec<Format>,
    pub only_main_content: bool,
    pub remove_base64_images: bool,
    /// Render wait before capture (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<u64>,
    /// Per-call timeout (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec![Format::Markdown],
            only_main_content: true,
            remove_base64_images: true,
            wait_for: None,
            timeout: None,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            headers: BTreeMap::new(),
        }
    }
}

impl ScrapeOptions {
    pub fn with_formats(mut self, formats: Vec<Format>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn with_wait_for(mut self, ms: u64) -> Self {
        self.wait_for = Some(ms);
        self
    }

    pub fn wants(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }
}

/// Options for URL discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub limit: usize,
    pub include_subdomains: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            limit: 500,
            include_subdomains: false,
        }
    }
}

/// What a scrape returns. Every body is optional; the adapter decides
/// whether an empty result is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPage {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub raw_html: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ScrapedPage {
    pub fn markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            ..Default::default()
        }
    }

    pub fn with_raw_html(mut self, raw_html: impl Into<String>) -> Self {
        self.raw_html = Some(raw_html.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn non_blank(s: &Option<String>) -> bool {
        s.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// True when neither markdown nor any HTML came back.
    pub fn is_empty(&self) -> bool {
        !Self::non_blank(&self.markdown)
            && !Self::non_blank(&self.html)
            && !Self::non_blank(&self.raw_html)
    }

    /// Best HTML available: raw first, then cleaned.
    pub fn best_html(&self) -> Option<&str> {
        self.raw_html
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.html.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// Rendering fetch capability.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Render and capture a single URL.
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> FetchResult<ScrapedPage>;

    /// List URLs reachable from a start URL.
    async fn map(&self, start_url: &str, options: &MapOptions) -> FetchResult<Vec<String>>;

    /// Backend name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_options_wire_names() {
        let opts = ScrapeOptions::default()
            .with_formats(vec![Format::Markdown, Format::RawHtml])
            .with_wait_for(5000);
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["formats"], serde_json::json!(["markdown", "rawHtml"]));
        assert_eq!(json["onlyMainContent"], true);
        assert_eq!(json["waitFor"], 5000);
        assert!(json.get("headers").is_none());
    }

    #[test]
    fn test_empty_page() {
        assert!(ScrapedPage::default().is_empty());
        assert!(ScrapedPage::markdown("  \n").is_empty());
        assert!(!ScrapedPage::default().with_raw_html("<p>x</p>").is_empty());
        assert_eq!(
            ScrapedPage::default().with_html("<b>h</b>").best_html(),
            Some("<b>h</b>")
        );
    }
}
