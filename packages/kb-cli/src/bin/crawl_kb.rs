//! Crawl seed domains into the knowledge base
//!
//! Exit codes: 0 success, 1 fatal (including strict-mode startup
//! failure), 2 invalid arguments.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use kb_cli::{exit, logging, summary, Config};
use kb_pipeline::{
    CrawlConfig, FetchAdapter, FirecrawlFetcher, HttpClient, HttpFetcher, KbPaths, Orchestrator,
    OverrideTable, PageFetcher, RefreshPolicy, RunStatus,
};

#[derive(Parser, Debug)]
#[command(name = "crawl_kb")]
#[command(about = "Crawl government service portals into the KB")]
struct Cli {
    /// KB root directory (defaults to KB_ROOT, then `kb`)
    #[arg(long)]
    kb_root: Option<PathBuf>,

    /// Seeds file (defaults to <kb-root>/seeds/<category>_seeds.json)
    #[arg(long)]
    seed_source: Option<PathBuf>,

    #[arg(long, default_value = "public_services")]
    category: String,

    /// changed | missing | all
    #[arg(long, default_value = "changed")]
    refresh: RefreshPolicy,

    #[arg(long = "maxDepth", default_value_t = 3)]
    max_depth: usize,

    #[arg(long = "maxPages", default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: u64,

    /// Delay between requests in milliseconds
    #[arg(long, default_value_t = 1500)]
    rate_limit: u64,

    /// Only crawl these hosts (repeatable)
    #[arg(long = "domain")]
    domains: Vec<String>,

    /// Fetch and extract without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Fail at startup when no Firecrawl key is configured
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    require_firecrawl: bool,

    /// Allow direct HTTP download of PDFs and office documents
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    allow_http_doc_download: bool,

    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig::new()
            .with_refresh(self.refresh)
            .with_max_depth(self.max_depth)
            .with_max_pages(self.max_pages as usize)
            .with_rate_limit(self.rate_limit)
            .with_domains(self.domains.iter().cloned())
            .with_strict(self.require_firecrawl)
            .with_http_doc_download(self.allow_http_doc_download)
            .with_dry_run(self.dry_run)
    }
}

/// Firecrawl when a key is configured; plain HTTP only when strict mode is off.
fn select_fetcher(config: &Config, crawl: &CrawlConfig) -> Result<Option<Arc<dyn PageFetcher>>> {
    if let Some(key) = &config.firecrawl_api_key {
        let fetcher = FirecrawlFetcher::new(key.clone())
            .context("Failed to create Firecrawl client")?
            .with_base_url(&config.firecrawl_api_url);
        tracing::info!(base_url = %fetcher.base_url(), "Using Firecrawl fetcher");
        return Ok(Some(Arc::new(fetcher)));
    }
    if crawl.strict {
        tracing::warn!("FIRECRAWL_API_KEY not set and --require-firecrawl is on");
        return Ok(None);
    }
    let fetcher = HttpFetcher::new(&crawl.user_agent, Duration::from_millis(crawl.timeout_ms))
        .context("Failed to create HTTP fetcher")?;
    tracing::info!("Using plain HTTP fetcher");
    Ok(Some(Arc::new(fetcher)))
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::from_env()?;
    let paths = KbPaths::new(config.kb_root_or(cli.kb_root.clone()));
    let crawl = cli.crawl_config();

    let fetcher = select_fetcher(&config, &crawl)?;
    let http = HttpClient::new(&crawl.user_agent, Duration::from_millis(crawl.timeout_ms))
        .context("Failed to create HTTP client")?;
    let overrides = OverrideTable::builtin_with_file(&paths.overrides_file())
        .context("Failed to load scrape overrides")?;
    tracing::info!(overrides = overrides.len(), "Scrape overrides loaded");

    let adapter = FetchAdapter::from_config(fetcher, &crawl)
        .with_http(Arc::new(http))
        .with_overrides(overrides);
    let seeds = cli
        .seed_source
        .clone()
        .unwrap_or_else(|| paths.seeds_file(&cli.category));

    tracing::info!(
        kb_root = %paths.root().display(),
        seeds = %seeds.display(),
        fetcher = %adapter.fetcher_name(),
        refresh = ?crawl.refresh,
        max_pages = crawl.max_pages,
        dry_run = crawl.dry_run,
        "Starting crawl"
    );

    let orchestrator = Orchestrator::new(adapter, crawl, paths);
    let report = orchestrator
        .run_seeds_file(&seeds)
        .await
        .with_context(|| format!("Crawl failed (report under {})", orchestrator.paths().root().display()))?;

    summary::print_run(&report);
    Ok(match report.status {
        RunStatus::Failed => exit::FATAL,
        _ => exit::SUCCESS,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit::FATAL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["crawl_kb"]).unwrap();
        let config = cli.crawl_config();
        assert_eq!(config.refresh, RefreshPolicy::Changed);
        assert_eq!(config.max_pages, 50);
        assert!(config.strict);
        assert!(!config.allow_http_doc_download);
        assert_eq!(cli.category, "public_services");
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "crawl_kb",
            "--refresh",
            "missing",
            "--maxDepth",
            "2",
            "--maxPages",
            "10",
            "--domain",
            "epassport.gov.bd",
            "--domain",
            "nidw.gov.bd",
            "--require-firecrawl",
            "false",
            "--dry-run",
        ])
        .unwrap();
        let config = cli.crawl_config();
        assert_eq!(config.refresh, RefreshPolicy::Missing);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.domains, vec!["epassport.gov.bd", "nidw.gov.bd"]);
        assert!(!config.strict);
        assert!(config.dry_run);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["crawl_kb", "--maxPages", "0"]).is_err());
        assert!(Cli::try_parse_from(["crawl_kb", "--refresh", "sometimes"]).is_err());
        assert!(Cli::try_parse_from(["crawl_kb", "--require-firecrawl", "maybe"]).is_err());
    }

    #[test]
    fn test_strict_without_key_has_no_fetcher() {
        let config = Config {
            firecrawl_api_key: None,
            firecrawl_api_url: "https://api.firecrawl.dev".into(),
            kb_root: "kb".into(),
            source_timestamp: None,
        };
        let strict = CrawlConfig::new();
        assert!(select_fetcher(&config, &strict).unwrap().is_none());

        let lenient = CrawlConfig::new().with_strict(false);
        let fetcher = select_fetcher(&config, &lenient).unwrap().unwrap();
        assert_eq!(fetcher.name(), "http");
    }
}
