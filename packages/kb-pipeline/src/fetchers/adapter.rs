//! Fetch adapter: overrides, retries, timeouts, empty-content policy and
//! the binary-document path, in front of a [`PageFetcher`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::http::html_to_markdown;
use super::overrides::OverrideTable;
use crate::error::{FetchError, FetchResult};
use crate::extractor::{document_extension, is_binary_url};
use crate::traits::fetcher::{MapOptions, PageFetcher, ScrapeOptions, ScrapedPage};
use crate::traits::http::{DocumentTextExtractor, HttpGet};
use crate::types::config::CrawlConfig;

/// How the content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Rendered,
    HttpDownload,
}

/// A fetched page, postprocessed and ready for extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub markdown: String,
    pub html: Option<String>,
    pub title: Option<String>,
    pub source: FetchSource,
    /// The URL names a binary document
    pub binary: bool,
    /// Bytes pulled by a direct download
    pub downloaded_bytes: Option<usize>,
}

impl FetchedPage {
    pub fn has_text(&self) -> bool {
        !self.markdown.trim().is_empty()
    }
}

pub struct FetchAdapter {
    fetcher: Option<Arc<dyn PageFetcher>>,
    http: Option<Arc<dyn HttpGet>>,
    overrides: OverrideTable,
    document_extractors: Vec<Arc<dyn DocumentTextExtractor>>,
    max_retries: u32,
    retry_delay: Duration,
    timeout: Duration,
    allow_http_doc_download: bool,
    max_file_size: u64,
}

impl FetchAdapter {
    pub fn new(fetcher: Option<Arc<dyn PageFetcher>>) -> Self {
        let defaults = CrawlConfig::default();
        Self {
            fetcher,
            http: None,
            overrides: OverrideTable::builtin(),
            document_extractors: Vec::new(),
            max_retries: defaults.max_retries,
            retry_delay: Duration::from_millis(defaults.retry_delay_ms),
            timeout: Duration::from_millis(defaults.timeout_ms),
            allow_http_doc_download: defaults.allow_http_doc_download,
            max_file_size: defaults.max_file_size,
        }
    }

    /// Adapter configured from run parameters.
    pub fn from_config(fetcher: Option<Arc<dyn PageFetcher>>, config: &CrawlConfig) -> Self {
        Self::new(fetcher)
            .with_retries(config.max_retries, Duration::from_millis(config.retry_delay_ms))
            .with_timeout(Duration::from_millis(config.timeout_ms))
            .with_http_doc_download(config.allow_http_doc_download)
            .with_max_file_size(config.max_file_size)
    }

    pub fn with_http(mut self, http: Arc<dyn HttpGet>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideTable) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_document_extractor(mut self, extractor: Arc<dyn DocumentTextExtractor>) -> Self {
        self.document_extractors.push(extractor);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_http_doc_download(mut self, allow: bool) -> Self {
        self.allow_http_doc_download = allow;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn has_fetcher(&self) -> bool {
        self.fetcher.is_some()
    }

    pub fn fetcher_name(&self) -> &str {
        self.fetcher.as_deref().map(|f| f.name()).unwrap_or("none")
    }

    fn fetcher(&self) -> FetchResult<&dyn PageFetcher> {
        self.fetcher
            .as_deref()
            .ok_or_else(|| FetchError::Unavailable("no fetch capability configured".into()))
    }

    /// Per-call limit: the merged option when set, else the adapter default.
    fn call_timeout(&self, options: &ScrapeOptions) -> Duration {
        options.timeout.map(Duration::from_millis).unwrap_or(self.timeout)
    }

    /// Run `op` under `timeout`, retrying only retryable errors.
    async fn retrying<T, F, Fut>(&self, url: &str, timeout: Duration, mut op: F) -> FetchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                }),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        url = %url,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn effective_options(&self, url: &str, options: &ScrapeOptions) -> ScrapeOptions {
        let mut options = match self.overrides.get(url) {
            Some(entry) => {
                debug!(url = %url, "Applying scrape override");
                entry.apply_options(options)
            }
            None => options.clone(),
        };
        if options.timeout.is_none() {
            options.timeout = Some(self.timeout.as_millis() as u64);
        }
        options
    }

    fn into_fetched(&self, url: &str, page: ScrapedPage, binary: bool) -> FetchedPage {
        let html = page.best_html().map(str::to_string);
        let markdown = match page.markdown.filter(|m| !m.trim().is_empty()) {
            Some(md) => md,
            None => html.as_deref().map(html_to_markdown).unwrap_or_default(),
        };
        let markdown = match self.overrides.get(url) {
            Some(entry) if entry.has_postprocess() => entry.postprocess(&markdown),
            _ => markdown,
        };
        FetchedPage {
            url: url.to_string(),
            markdown,
            html,
            title: page.title,
            source: FetchSource::Rendered,
            binary,
            downloaded_bytes: None,
        }
    }

    /// Fetch a page through the rendering backend.
    ///
    /// Empty results raise `ScrapeFailed(url, "empty content")` unless
    /// `allow_empty` is set. Binary document URLs take [`Self::fetch_document`].
    pub async fn scrape(
        &self,
        url: &str,
        options: &ScrapeOptions,
        allow_empty: bool,
    ) -> FetchResult<FetchedPage> {
        if is_binary_url(url) {
            return self.fetch_document(url, options).await;
        }

        let fetcher = self.fetcher()?;
        let options = self.effective_options(url, options);
        let opts = &options;
        let page = self
            .retrying(url, self.call_timeout(opts), move || fetcher.scrape(url, opts))
            .await?;

        if page.is_empty() && !allow_empty {
            return Err(FetchError::scrape_failed(url, "empty content"));
        }
        Ok(self.into_fetched(url, page, false))
    }

    /// Binary documents: rendered fetch first, direct download only when allowed.
    pub async fn fetch_document(&self, url: &str, options: &ScrapeOptions) -> FetchResult<FetchedPage> {
        if let Ok(fetcher) = self.fetcher() {
            let options = self.effective_options(url, options);
            let opts = &options;
            let timeout = self.call_timeout(opts);
            match self.retrying(url, timeout, move || fetcher.scrape(url, opts)).await {
                Ok(page) if !page.is_empty() => return Ok(self.into_fetched(url, page, true)),
                Ok(_) => debug!(url = %url, "Rendered fetch of document returned nothing"),
                Err(e) => debug!(url = %url, error = %e, "Rendered fetch of document failed"),
            }
        }

        if !self.allow_http_doc_download {
            return Err(FetchError::HttpDownloadNotAllowed {
                url: url.to_string(),
            });
        }
        let http = self
            .http
            .as_deref()
            .ok_or_else(|| FetchError::Unavailable("no HTTP client configured".into()))?;

        let max = self.max_file_size;
        let bytes = self
            .retrying(url, self.timeout, move || http.get_bytes(url, max))
            .await?
            .ok_or_else(|| FetchError::scrape_failed(url, "document not found"))?;

        let extension = document_extension(url).unwrap_or_default();
        let markdown = self
            .document_extractors
            .iter()
            .find(|x| x.supports(extension))
            .and_then(|x| x.extract(&bytes))
            .unwrap_or_default();

        info!(url = %url, bytes = bytes.len(), extracted = !markdown.is_empty(), "Downloaded document");
        Ok(FetchedPage {
            url: url.to_string(),
            markdown,
            html: None,
            title: None,
            source: FetchSource::HttpDownload,
            binary: true,
            downloaded_bytes: Some(bytes.len()),
        })
    }

    /// Discover URLs from a start URL.
    pub async fn map(&self, start_url: &str, options: &MapOptions) -> FetchResult<Vec<String>> {
        let fetcher = self.fetcher()?;
        self.retrying(start_url, self.timeout, move || fetcher.map(start_url, options))
            .await
    }

    /// Plain HTTP text (robots.txt, sitemaps). Absent client or status → `None`.
    pub async fn get_text(&self, url: &str) -> FetchResult<Option<String>> {
        match self.http.as_deref() {
            Some(http) => self.retrying(url, self.timeout, move || http.get_text(url)).await,
            None => Ok(None),
        }
    }
}
