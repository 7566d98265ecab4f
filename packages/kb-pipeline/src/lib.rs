//! Knowledge-base pipeline for Bangladesh government service portals.
//!
//! Crawls service portals, extracts procedural steps, fees, FAQs and
//! document links with deterministic bilingual (English + Bengali) rules,
//! and keeps them in a single auditable KB of **claims**: small facts,
//! each tied to the page and text span that produced it. A build step
//! projects the KB into reader-facing guides with resolved citations.
//!
//! # Design
//!
//! - Claim ids are derived from content, so re-running against the same
//!   pages adds nothing
//! - Snapshots are stored per page per day and referenced, never inlined
//! - Per-URL scrape overrides are data, not code paths
//! - Fetch backends sit behind a trait and can be absent
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kb_pipeline::{CrawlConfig, FetchAdapter, HttpClient, KbPaths, Orchestrator};
//!
//! let config = CrawlConfig::new().with_max_pages(20);
//! let http = HttpClient::new(&config.user_agent, Duration::from_secs(30))?;
//! let adapter = FetchAdapter::from_config(Some(Arc::new(fetcher)), &config)
//!     .with_http(Arc::new(http));
//!
//! let paths = KbPaths::new("kb");
//! let orchestrator = Orchestrator::new(adapter, config, paths.clone());
//! let report = orchestrator.run_seeds_file(&paths.seeds_file("public_services")).await?;
//! ```
//!
//! # Modules
//!
//! - [`identity`] - hashing, URL canonicalization, claim ids, service map
//! - [`extractor`] - markdown → steps, fees, FAQs, documents
//! - [`fetchers`] - fetch adapter, overrides and fetcher implementations
//! - [`crawlers`] - robots.txt, sitemaps, URL prioritization
//! - [`stores`] - snapshot store and KB writer
//! - [`pipeline`] - claims, orchestrator, guides, publishing, validation
//! - [`testing`] - mock implementations for testing

#![recursion_limit = "256"]

pub mod crawlers;
pub mod error;
pub mod extractor;
pub mod fetchers;
pub mod identity;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    FetchError, IssueKind, KbError, PipelineError, Result, ValidationError, ValidationIssue,
};
pub use traits::{
    fetcher::{Format, MapOptions, PageFetcher, ScrapeOptions, ScrapedPage},
    http::{DocumentTextExtractor, HttpGet},
};
pub use types::{
    claim::{Citation, Claim, ClaimPayload, ClaimStatus, ClaimType, EntityRef, Locator},
    config::{CrawlConfig, KbPaths, RefreshPolicy},
    extracted::{ExtractedData, FeeVariant},
    guide::{PublicGuide, PublicGuides, PublicGuidesIndex},
    kb::{Agency, KnowledgeBase, Service, ServiceGuide},
    page::{Language, PageType, SourcePage},
    report::{DomainReport, FailureReason, FailureStage, RunCounters, RunReport, RunStatus},
    seeds::{Seed, SeedsFile},
};

pub use crawlers::RobotsTxt;
pub use fetchers::{FetchAdapter, HttpClient, HttpFetcher, OverrideTable};
pub use pipeline::{build_public_guides, resolve_generated_at, Orchestrator, PublishedOutputs};
pub use stores::{KbWriter, SnapshotStore};

#[cfg(feature = "firecrawl")]
pub use fetchers::FirecrawlFetcher;
