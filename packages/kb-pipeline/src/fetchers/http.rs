//! Plain HTTP fetch: reqwest + scraper + htmd.
//!
//! No script rendering. Used as the HTTP capability (robots.txt, sitemaps,
//! binary documents) and as a lenient-mode page fetcher for static sites.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{Format, MapOptions, PageFetcher, ScrapeOptions, ScrapedPage};
use crate::traits::http::HttpGet;

const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".main",
];

const BOILERPLATE_SELECTORS: &[&str] = &[
    "nav", "header", "footer", "aside", ".navbar", ".sidebar", ".menu", "#nav", "#header",
    "#footer", "#sidebar", "script", "style", "noscript", "iframe",
];

/// Convert HTML to markdown, falling back to the document's text.
pub fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|_| {
        Html::parse_document(html)
            .root_element()
            .text()
            .collect::<String>()
    })
}

fn classify_reqwest(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport(Box::new(e))
    }
}

fn build_client(user_agent: &str, timeout: Duration) -> FetchResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| FetchError::Transport(Box::new(e)))
}

/// `HttpGet` over reqwest with a streamed size limit.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> FetchResult<Self> {
        Ok(Self {
            client: build_client(user_agent, timeout)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpGet for HttpClient {
    async fn get_text(&self, url: &str) -> FetchResult<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest(url, e))?;
        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "HTTP GET non-success");
            return Ok(None);
        }
        response
            .text()
            .await
            .map(Some)
            .map_err(|e| classify_reqwest(url, e))
    }

    async fn get_bytes(&self, url: &str, max_size: u64) -> FetchResult<Option<Vec<u8>>> {
        let too_large = || FetchError::FileTooLarge {
            url: url.to_string(),
            limit: max_size,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest(url, e))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        if response.content_length().is_some_and(|len| len > max_size) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_reqwest(url, e))?
        {
            if (body.len() + chunk.len()) as u64 > max_size {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Some(body))
    }
}

/// Static-HTML page fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> FetchResult<Self> {
        Ok(Self {
            client: build_client(user_agent, timeout)?,
        })
    }

    async fn fetch_html(&self, url: &str) -> FetchResult<(String, Url)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest(url, e))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 || status.as_u16() == 408 {
            return Err(FetchError::transport(format!("HTTP {} for {}", status, url)));
        }
        if !status.is_success() {
            return Err(FetchError::scrape_failed(url, format!("HTTP {}", status)));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| classify_reqwest(url, e))?;
        Ok((html, final_url))
    }

    fn extract_title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn extract_main_content(document: &Html) -> String {
        for selector_str in MAIN_SELECTORS {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(main) = document.select(&selector).next() {
                    return main.html();
                }
            }
        }
        Self::extract_body(document)
    }

    fn extract_body(document: &Html) -> String {
        let body = match Selector::parse("body") {
            Ok(selector) => document.select(&selector).next().map(|b| b.html()),
            Err(_) => None,
        };
        let Some(mut html) = body else {
            return document.html();
        };
        for selector_str in BOILERPLATE_SELECTORS {
            if let Ok(selector) = Selector::parse(selector_str) {
                for element in document.select(&selector) {
                    html = html.replace(&element.html(), "");
                }
            }
        }
        html
    }

    /// Same-host http(s) links, fragments dropped, in document order.
    pub fn extract_links(html: &str, base_url: &Url, include_subdomains: bool) -> Vec<String> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        let base_host = base_url.host_str().unwrap_or("").to_lowercase();
        let document = Html::parse_document(html);

        let mut seen = indexmap::IndexSet::new();
        for href in document
            .select(&selector)
            .filter_map(|el| el.value().attr("href"))
        {
            let Ok(mut url) = base_url.join(href.trim()) else {
                continue;
            };
            if url.scheme() != "http" && url.scheme() != "https" {
                continue;
            }
            let host = url.host_str().unwrap_or("").to_lowercase();
            let same = host == base_host
                || (include_subdomains && host.ends_with(&format!(".{}", base_host)));
            if !same {
                continue;
            }
            url.set_fragment(None);
            seen.insert(url.to_string());
        }
        seen.into_iter().collect()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> FetchResult<ScrapedPage> {
        let (raw, _) = self.fetch_html(url).await?;
        let document = Html::parse_document(&raw);

        let content = if options.only_main_content {
            Self::extract_main_content(&document)
        } else {
            Self::extract_body(&document)
        };

        let mut page = ScrapedPage::markdown(html_to_markdown(&content));
        if let Some(title) = Self::extract_title(&document) {
            page = page.with_title(title);
        }
        if options.wants(Format::Html) {
            page = page.with_html(content);
        }
        if options.wants(Format::RawHtml) {
            page = page.with_raw_html(raw);
        }
        Ok(page)
    }

    async fn map(&self, start_url: &str, options: &MapOptions) -> FetchResult<Vec<String>> {
        let (html, final_url) = self.fetch_html(start_url).await?;
        let mut links = vec![start_url.to_string()];
        for link in Self::extract_links(&html, &final_url, options.include_subdomains) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
        links.truncate(options.limit);
        Ok(links)
    }

    fn name(&self) -> &str {
        "http"
    }
}
