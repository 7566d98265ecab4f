//! Fetch capability implementations and the adapter in front of them.
//!
//! # Available Fetchers
//!
//! - `FirecrawlFetcher` - Firecrawl API, renders scripts (requires `firecrawl` feature)
//! - `HttpFetcher` - plain HTTP for static pages
//! - `MockFetcher` - for testing
//!
//! `FetchAdapter` wraps whichever fetcher is configured with the per-URL
//! override table, retries, timeouts and the binary-document path.
//!
//! # Example
//!
//! ```rust,ignore
//! use kb_pipeline::fetchers::{FetchAdapter, OverrideTable};
//!
//! let adapter = FetchAdapter::from_config(Some(fetcher), &config)
//!     .with_overrides(OverrideTable::builtin());
//! let page = adapter.scrape(url, &ScrapeOptions::default(), false).await?;
//! ```

mod adapter;
mod http;
mod mock;
mod overrides;

#[cfg(feature = "firecrawl")]
mod firecrawl;

pub use adapter::{FetchAdapter, FetchSource, FetchedPage};
pub use http::{html_to_markdown, HttpClient, HttpFetcher};
pub use mock::{MockCall, MockFailure, MockFetcher};
pub use overrides::{
    normalize_key, OverrideTable, Postprocess, ScrapeOverride, EPASSPORT_FEES_URL,
    OVERRIDABLE_KEYS,
};

#[cfg(feature = "firecrawl")]
pub use firecrawl::{FirecrawlFetcher, FIRECRAWL_API_URL};
