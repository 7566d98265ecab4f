//! Firecrawl-backed page fetcher.
//!
//! Firecrawl renders pages in a browser, so client-rendered portals come
//! back with their script-built content. Uses the synchronous
//! `/v1/scrape` and `/v1/map` endpoints.
//!
//! Requires the `firecrawl` feature to be enabled.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{MapOptions, PageFetcher, ScrapeOptions, ScrapedPage};

pub const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev";

/// Slack added to the page timeout for the HTTP round trip.
const REQUEST_MARGIN_MS: u64 = 15_000;

/// Firecrawl API fetcher.
///
/// # Example
///
/// ```rust,ignore
/// use kb_pipeline::fetchers::FirecrawlFetcher;
///
/// let fetcher = FirecrawlFetcher::new(api_key)?.with_base_url("http://localhost:3002");
/// let page = fetcher.scrape(url, &ScrapeOptions::default()).await?;
/// ```
pub struct FirecrawlFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    #[serde(flatten)]
    options: &'a ScrapeOptions,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeData {
    markdown: Option<String>,
    html: Option<String>,
    raw_html: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapRequest<'a> {
    url: &'a str,
    limit: usize,
    include_subdomains: bool,
}

#[derive(Deserialize)]
struct MapResponse {
    success: bool,
    #[serde(default)]
    links: Vec<String>,
    error: Option<String>,
}

impl FirecrawlFetcher {
    pub fn new(api_key: impl Into<String>) -> FetchResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(FetchError::Unavailable("FIRECRAWL_API_KEY is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| FetchError::Transport(Box::new(e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Point at a self-hosted instance (or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        endpoint: &str,
        body: &T,
        timeout: Option<Duration>,
    ) -> FetchResult<R> {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Transport(Box::new(e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(url, status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::scrape_failed(url, format!("invalid Firecrawl response: {}", e)))
    }
}

/// Map a non-success HTTP status to the fetch error taxonomy.
fn classify_status(url: &str, status: StatusCode, body: &str) -> FetchError {
    let detail = format!("Firecrawl API error: {} - {}", status, body.trim());
    match status.as_u16() {
        401 | 402 | 403 => FetchError::Unavailable(detail),
        408 | 429 => FetchError::transport(detail),
        s if s >= 500 => FetchError::transport(detail),
        _ => FetchError::scrape_failed(url, detail),
    }
}

#[async_trait]
impl PageFetcher for FirecrawlFetcher {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> FetchResult<ScrapedPage> {
        tracing::debug!(url = %url, wait_for = ?options.wait_for, "Firecrawl scrape");

        let timeout = options
            .timeout
            .map(|t| Duration::from_millis(t + options.wait_for.unwrap_or(0) + REQUEST_MARGIN_MS));
        let request = ScrapeRequest { url, options };
        let response: ScrapeResponse = self.post(url, "/v1/scrape", &request, timeout).await?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "Firecrawl scrape failed".into());
            return Err(FetchError::scrape_failed(url, reason));
        }
        let Some(data) = response.data else {
            return Ok(ScrapedPage::default());
        };

        Ok(ScrapedPage {
            markdown: data.markdown,
            html: data.html,
            raw_html: data.raw_html,
            title: data.metadata.and_then(|m| m.title),
        })
    }

    async fn map(&self, start_url: &str, options: &MapOptions) -> FetchResult<Vec<String>> {
        tracing::info!(url = %start_url, limit = options.limit, "Firecrawl map");

        let request = MapRequest {
            url: start_url,
            limit: options.limit,
            include_subdomains: options.include_subdomains,
        };
        let response: MapResponse = self.post(start_url, "/v1/map", &request, None).await?;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "Firecrawl map failed".into());
            return Err(FetchError::scrape_failed(start_url, reason));
        }
        Ok(response.links)
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_fetcher() {
        let fetcher = FirecrawlFetcher::new("test-key").unwrap();
        assert_eq!(fetcher.name(), "firecrawl");
        assert_eq!(fetcher.base_url(), FIRECRAWL_API_URL);
    }

    #[test]
    fn test_empty_key_is_unavailable() {
        assert!(matches!(
            FirecrawlFetcher::new("  "),
            Err(FetchError::Unavailable(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        let url = "https://x.gov.bd";
        assert!(matches!(
            classify_status(url, StatusCode::PAYMENT_REQUIRED, ""),
            FetchError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(url, StatusCode::NOT_FOUND, ""),
            FetchError::ScrapeFailed { .. }
        ));
        assert!(classify_status(url, StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status(url, StatusCode::BAD_GATEWAY, "").is_retryable());
    }

    #[test]
    fn test_scrape_request_flattens_options() {
        let options = ScrapeOptions::default().with_wait_for(5000);
        let body = serde_json::to_value(ScrapeRequest {
            url: "https://x.gov.bd",
            options: &options,
        })
        .unwrap();
        assert_eq!(body["url"], "https://x.gov.bd");
        assert_eq!(body["waitFor"], 5000);
        assert_eq!(body["formats"], serde_json::json!(["markdown"]));
    }
}
