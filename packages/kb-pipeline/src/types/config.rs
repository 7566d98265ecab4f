//! Run configuration and on-disk layout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How already-known pages are treated on a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Fetch every page; unchanged content is a silent no-op
    #[default]
    Changed,
    /// Skip pages that already have a snapshot for today
    Missing,
    /// Always fetch and overwrite
    All,
}

impl std::str::FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "changed" => Ok(Self::Changed),
            "missing" => Ok(Self::Missing),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown refresh policy '{}' (expected changed, missing or all)",
                other
            )),
        }
    }
}

/// Parameters of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub refresh: RefreshPolicy,

    /// Maximum URL path depth kept as a candidate
    pub max_depth: usize,

    /// Pages fetched per domain after prioritization
    pub max_pages: usize,

    /// Delay between requests (milliseconds); doubled between domains
    pub rate_limit_ms: u64,

    /// Restrict the run to these hosts (empty = every seed)
    #[serde(default)]
    pub domains: Vec<String>,

    /// Fail fast when no fetch capability is configured
    pub strict: bool,

    /// Permit direct HTTP download of binary documents
    pub allow_http_doc_download: bool,

    /// Fetch and extract but never write snapshots, KB or reports
    pub dry_run: bool,

    /// Retries for unclassified fetch errors
    pub max_retries: u32,

    /// Constant delay between retries (milliseconds)
    pub retry_delay_ms: u64,

    /// Per-call fetch timeout (milliseconds)
    pub timeout_ms: u64,

    /// Abort binary downloads beyond this many bytes
    pub max_file_size: u64,

    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshPolicy::Changed,
            max_depth: 3,
            max_pages: 50,
            rate_limit_ms: 1500,
            domains: Vec::new(),
            strict: true,
            allow_http_doc_download: false,
            dry_run: false,
            max_retries: 2,
            retry_delay_ms: 2000,
            timeout_ms: 30_000,
            max_file_size: 50 * 1024 * 1024,
            user_agent: "bd-services-kb/1.0".to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_rate_limit(mut self, ms: u64) -> Self {
        self.rate_limit_ms = ms;
        self
    }

    pub fn with_domains(mut self, domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_http_doc_download(mut self, allow: bool) -> Self {
        self.allow_http_doc_download = allow;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Whether a seed domain is selected by the `domains` filter.
    pub fn selects_domain(&self, domain: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let domain = domain.trim_start_matches("www.");
        self.domains
            .iter()
            .any(|d| d.trim_start_matches("www.").eq_ignore_ascii_case(domain))
    }
}

/// Every on-disk location, derived from the KB root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KbPaths {
    root: PathBuf,
}

impl KbPaths {
    pub const KB_FILE: &'static str = "bangladesh_government_services_kb_v3.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kb_file(&self) -> PathBuf {
        self.root.join(Self::KB_FILE)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn seeds_file(&self, category: &str) -> PathBuf {
        self.root
            .join("seeds")
            .join(format!("{}_seeds.json", category))
    }

    pub fn run_report(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join("runs")
            .join(date.format("%Y-%m-%d").to_string())
            .join("crawl_report.json")
    }

    pub fn published_dir(&self) -> PathBuf {
        self.root.join("published")
    }

    pub fn overrides_file(&self) -> PathBuf {
        self.root.join("config").join("scrape_overrides.json")
    }
}
