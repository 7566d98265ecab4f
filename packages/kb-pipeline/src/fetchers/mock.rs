//! Mock fetcher for testing.
//!
//! Canned pages and map results, failure injection, and call recording.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{MapOptions, PageFetcher, ScrapeOptions, ScrapedPage};

/// A failure to inject for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Unavailable,
    ScrapeFailed,
    Transport,
    Timeout,
}

impl MockFailure {
    fn to_error(self, url: &str) -> FetchError {
        match self {
            Self::Unavailable => FetchError::Unavailable("mock backend unavailable".into()),
            Self::ScrapeFailed => FetchError::scrape_failed(url, "mock scrape failure"),
            Self::Transport => FetchError::transport("mock connection reset"),
            Self::Timeout => FetchError::Timeout {
                url: url.to_string(),
            },
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Scrape { url: String, options: ScrapeOptions },
    Map { url: String },
}

/// Mock page fetcher.
///
/// Clones share state, so a test can keep a handle for assertions after
/// handing an `Arc` to the pipeline.
///
/// # Example
///
/// ```rust
/// use kb_pipeline::testing::MockFetcher;
/// use kb_pipeline::traits::fetcher::ScrapedPage;
///
/// let mock = MockFetcher::new()
///     .with_page("https://www.epassport.gov.bd/", ScrapedPage::markdown("# e-Passport"))
///     .with_map("https://www.epassport.gov.bd/", vec!["https://www.epassport.gov.bd/".into()]);
/// assert_eq!(mock.call_count(), 0);
/// ```
#[derive(Default, Clone)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, ScrapedPage>>>,
    maps: Arc<RwLock<HashMap<String, Vec<String>>>>,
    /// Remaining injected failures per URL
    failures: Arc<RwLock<HashMap<String, (MockFailure, usize)>>>,
    map_failure: Arc<RwLock<Option<MockFailure>>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, page: ScrapedPage) {
        self.pages.write().unwrap().insert(url.to_string(), page);
    }

    pub fn with_page(self, url: &str, page: ScrapedPage) -> Self {
        self.add_page(url, page);
        self
    }

    /// Shorthand for a markdown-only page.
    pub fn with_markdown(self, url: &str, markdown: &str) -> Self {
        self.with_page(url, ScrapedPage::markdown(markdown))
    }

    pub fn with_map(self, start_url: &str, urls: Vec<String>) -> Self {
        self.maps.write().unwrap().insert(start_url.to_string(), urls);
        self
    }

    /// Fail the next `times` scrapes of `url`.
    pub fn with_failures(self, url: &str, failure: MockFailure, times: usize) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url.to_string(), (failure, times));
        self
    }

    /// Fail every map call.
    pub fn with_map_failure(self, failure: MockFailure) -> Self {
        *self.map_failure.write().unwrap() = Some(failure);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn scrape_count(&self, url: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::Scrape { url: u, .. } if u == url))
            .count()
    }

    pub fn scraped_urls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                MockCall::Scrape { url, .. } => Some(url.clone()),
                MockCall::Map { .. } => None,
            })
            .collect()
    }

    pub fn last_scrape_options(&self, url: &str) -> Option<ScrapeOptions> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                MockCall::Scrape { url: u, options } if u == url => Some(options.clone()),
                _ => None,
            })
    }

    pub fn reset_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn take_failure(&self, url: &str) -> Option<MockFailure> {
        let mut failures = self.failures.write().unwrap();
        let (failure, remaining) = failures.get_mut(url)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(*failure)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> FetchResult<ScrapedPage> {
        self.calls.write().unwrap().push(MockCall::Scrape {
            url: url.to_string(),
            options: options.clone(),
        });

        if let Some(failure) = self.take_failure(url) {
            return Err(failure.to_error(url));
        }
        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::scrape_failed(url, "HTTP 404"))
    }

    async fn map(&self, start_url: &str, options: &MapOptions) -> FetchResult<Vec<String>> {
        self.calls.write().unwrap().push(MockCall::Map {
            url: start_url.to_string(),
        });

        if let Some(failure) = *self.map_failure.read().unwrap() {
            return Err(failure.to_error(start_url));
        }
        let mut urls = self
            .maps
            .read()
            .unwrap()
            .get(start_url)
            .cloned()
            .unwrap_or_default();
        urls.truncate(options.limit);
        Ok(urls)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
