//! Crawl orchestrator.
//!
//! Per seed domain: robots.txt, sitemaps, map, candidate filtering,
//! prioritization, then a paced fetch → snapshot → extract → claims loop.
//! The KB is checkpointed after every domain and a run report is written
//! at the end, including for runs that fail.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kb_pipeline::{CrawlConfig, FetchAdapter, KbPaths, Orchestrator};
//!
//! let adapter = FetchAdapter::from_config(Some(fetcher), &config).with_http(http);
//! let orchestrator = Orchestrator::new(adapter, config, KbPaths::new("kb"));
//! let report = orchestrator.run_seeds_file(&paths.seeds_file("public_services")).await?;
//! println!("{} claims added", report.totals.claims_added);
//! ```

use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::crawlers::{collect_sitemap_urls, fetch_robots, prioritize, CandidateFilter, RobotsTxt};
use crate::error::{FetchError, KbResult, PipelineError, Result};
use crate::extractor::{self, classify_page, detect_languages};
use crate::fetchers::FetchAdapter;
use crate::identity;
use crate::pipeline::claims::{build_claims, ClaimSource};
use crate::pipeline::guides::refresh_guides;
use crate::stores::{write_json_atomic, KbWriter, PageUpsert, SnapshotStore};
use crate::traits::fetcher::{Format, MapOptions, ScrapeOptions};
use crate::types::config::{CrawlConfig, KbPaths, RefreshPolicy};
use crate::types::page::SourcePage;
use crate::types::report::{DomainReport, FailureReason, FailureStage, RunReport};
use crate::types::seeds::{Seed, SeedsFile};

/// What happened to one candidate URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlOutcome {
    Kept,
    Unchanged,
    Skipped,
    Failed,
}

pub struct Orchestrator {
    adapter: FetchAdapter,
    config: CrawlConfig,
    paths: KbPaths,
}

impl Orchestrator {
    pub fn new(adapter: FetchAdapter, config: CrawlConfig, paths: KbPaths) -> Self {
        Self {
            adapter,
            config,
            paths,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn paths(&self) -> &KbPaths {
        &self.paths
    }

    fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.config.rate_limit_ms)
    }

    /// Write the run report unless this is a dry run.
    fn write_report(&self, report: &RunReport) -> KbResult<()> {
        if self.config.dry_run {
            return Ok(());
        }
        let path = self.paths.run_report(report.started_at.date_naive());
        write_json_atomic(&path, report)?;
        info!(path = %path.display(), status = ?report.status, "Run report written");
        Ok(())
    }

    /// Record a run-level failure, persist the report and hand back `err`.
    fn fail_run<T>(&self, report: &mut RunReport, stage: FailureStage, err: PipelineError) -> Result<T> {
        report.fail(stage, err.to_string());
        if let Err(e) = self.write_report(report) {
            warn!(error = %e, "Failed to write failure report");
        }
        Err(err)
    }

    /// Load a seeds file and run it. A bad seeds file still yields a report.
    pub async fn run_seeds_file(&self, seeds_path: &Path) -> Result<RunReport> {
        match SeedsFile::load(seeds_path) {
            Ok(seeds) => self.run(&seeds.seeds).await,
            Err(e) => {
                let mut report = RunReport::start(self.config.refresh, self.config.dry_run);
                self.fail_run(&mut report, FailureStage::Seeds, e)
            }
        }
    }

    /// Crawl every selected seed in order.
    pub async fn run(&self, seeds: &[Seed]) -> Result<RunReport> {
        let mut report = RunReport::start(self.config.refresh, self.config.dry_run);

        if self.config.strict && !self.adapter.has_fetcher() {
            let err = PipelineError::FetchCapabilityMissing(
                "strict mode is on and no page fetcher is configured (set FIRECRAWL_API_KEY or pass --require-firecrawl false)"
                    .into(),
            );
            tracing::error!("{}", err);
            return self.fail_run(&mut report, FailureStage::Startup, err);
        }

        let mut writer = match KbWriter::load(self.paths.kb_file()) {
            Ok(w) => w,
            Err(e) => return self.fail_run(&mut report, FailureStage::Startup, e.into()),
        };
        let snapshots = SnapshotStore::new(self.paths.snapshots_dir());

        let selected: Vec<&Seed> = seeds
            .iter()
            .filter(|s| self.config.selects_domain(&s.domain))
            .collect();
        info!(
            seeds = seeds.len(),
            selected = selected.len(),
            fetcher = %self.adapter.fetcher_name(),
            refresh = ?self.config.refresh,
            dry_run = self.config.dry_run,
            "Starting crawl"
        );

        for (i, seed) in selected.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.rate_limit() * 2).await;
            }
            report.current_domain = Some(seed.domain.clone());

            let domain_report = self.crawl_domain(seed, &mut writer, &snapshots).await;
            log_domain_summary(&domain_report);

            refresh_guides(&mut writer, std::slice::from_ref(&domain_report.service_id), Utc::now());
            report.push_domain(domain_report);

            if !self.config.dry_run {
                if let Err(e) = writer.save(format!("crawl {}", seed.domain)) {
                    return self.fail_run(&mut report, FailureStage::Domain, e.into());
                }
            }
        }

        let dangling = writer.dangling_references();
        if !dangling.is_empty() {
            for (claim_id, page_id) in dangling.iter().take(10) {
                warn!(claim_id = %claim_id, source_page_id = %page_id, "Dangling citation");
            }
            let err = PipelineError::DanglingReferences(dangling.len());
            return self.fail_run(&mut report, FailureStage::Finalize, err);
        }
        if let Err(e) = writer.check_invariants() {
            return self.fail_run(&mut report, FailureStage::Finalize, e.into());
        }

        report.complete();
        if let Err(e) = self.write_report(&report) {
            return self.fail_run(&mut report, FailureStage::Finalize, e.into());
        }
        info!(
            domains = report.domains.len(),
            domains_failed = report.domains_failed(),
            pages_kept = report.totals.pages_kept,
            claims_added = report.totals.claims_added,
            errors = report.totals.errors,
            "Crawl complete"
        );
        Ok(report)
    }

    async fn crawl_domain(&self, seed: &Seed, writer: &mut KbWriter, snapshots: &SnapshotStore) -> DomainReport {
        let domain = seed.domain.trim().to_lowercase();
        let service_id = writer.ensure_service(&domain, &seed.label);
        let mut report = DomainReport::new(&domain, &service_id);
        info!(domain = %domain, service_id = %service_id, "Crawling domain");

        let start_urls: Vec<String> = seed
            .effective_start_urls()
            .iter()
            .filter_map(|u| identity::canonicalize_url(u))
            .collect();
        let Some(origin) = start_urls
            .first()
            .and_then(|u| Url::parse(u).ok())
            .map(|u| u.origin().ascii_serialization())
        else {
            report.failure_reason = Some(FailureReason::OtherError);
            report.failure_message = Some("no parseable start URL".into());
            return report;
        };

        let robots = fetch_robots(&self.adapter, &origin).await;
        let sitemap_urls = collect_sitemap_urls(&self.adapter, &origin, &robots).await;

        let map_options = MapOptions {
            limit: MapOptions::default().limit.max(self.config.max_pages * 10),
            include_subdomains: true,
        };
        let mut mapped = Vec::new();
        for start in &start_urls {
            match self.adapter.map(start, &map_options).await {
                Ok(urls) => {
                    debug!(url = %start, urls = urls.len(), "Mapped");
                    mapped.extend(urls);
                }
                Err(e) if self.config.strict => {
                    let reason = match &e {
                        FetchError::Unavailable(_) => FailureReason::FirecrawlUnavailable,
                        _ => FailureReason::FirecrawlMapFailed,
                    };
                    warn!(domain = %domain, reason = reason.as_str(), error = %e, "Map failed, skipping domain");
                    report.failure_reason = Some(reason);
                    report.failure_message = Some(e.to_string());
                    return report;
                }
                Err(e) => {
                    warn!(url = %start, error = %e, "Map failed, continuing with known URLs");
                    report.record_error(start.clone(), e.to_string());
                }
            }
        }

        let filter = CandidateFilter::new(&domain, &robots, &self.config.user_agent, self.config.max_depth);
        let mut candidates = indexmap::IndexSet::new();
        for raw in start_urls.iter().chain(&sitemap_urls).chain(&mapped) {
            if let Some(url) = identity::canonicalize_url(raw) {
                candidates.insert(url);
            }
        }
        report.counters.pages_seen = candidates.len();

        let accepted: Vec<&String> = candidates.iter().filter(|u| filter.accepts(u)).collect();
        let rejected = candidates.len() - accepted.len();
        let prioritized = prioritize(accepted, self.config.max_pages);
        report.counters.pages_excluded = rejected + prioritized.excluded;
        info!(
            domain = %domain,
            candidates = candidates.len(),
            excluded = report.counters.pages_excluded,
            capped = prioritized.capped,
            queued = prioritized.urls.len(),
            "Prioritized candidates"
        );

        let delay = self.page_delay(&robots);
        let service_key = identity::service_key_for_domain(&domain);
        for (i, scored) in prioritized.urls.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(delay).await;
            }
            let ctx = PageContext {
                url: &scored.url,
                service_id: &service_id,
                service_key: &service_key,
            };
            match self.process_url(&ctx, writer, snapshots, &mut report).await {
                Ok(outcome) => debug!(url = %scored.url, score = scored.score, outcome = ?outcome, "URL done"),
                Err(e) => {
                    warn!(domain = %domain, url = %scored.url, error = %e, "Storage failure, abandoning domain");
                    report.failure_reason = Some(FailureReason::OtherError);
                    report.failure_message = Some(e.to_string());
                    break;
                }
            }
        }
        report
    }

    /// Rate limit, raised to the robots.txt crawl delay when that is longer.
    fn page_delay(&self, robots: &RobotsTxt) -> Duration {
        robots
            .crawl_delay(&self.config.user_agent)
            .map_or(self.rate_limit(), |d| d.max(self.rate_limit()))
    }

    async fn process_url(
        &self,
        ctx: &PageContext<'_>,
        writer: &mut KbWriter,
        snapshots: &SnapshotStore,
        report: &mut DomainReport,
    ) -> KbResult<UrlOutcome> {
        let url = ctx.url;
        let source_page_id = identity::source_page_id(url);

        if self.config.refresh == RefreshPolicy::Missing && snapshots.exists_today(&source_page_id) {
            info!(url = %url, "Snapshot exists for today, skipping");
            report.counters.pages_skipped += 1;
            return Ok(UrlOutcome::Skipped);
        }

        let options = ScrapeOptions::default().with_formats(vec![Format::Markdown, Format::RawHtml]);
        let fetched = match self.adapter.scrape(url, &options, false).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                report.record_error(url, e.to_string());
                return Ok(UrlOutcome::Failed);
            }
        };
        if fetched.binary {
            report.counters.docs_found += 1;
        }
        if !fetched.has_text() {
            info!(url = %url, "No extractable text, skipping");
            report.counters.pages_skipped += 1;
            return Ok(UrlOutcome::Skipped);
        }

        let now = Utc::now();
        let data = extractor::extract(&fetched.markdown, url, fetched.html.as_deref());
        let title = fetched
            .title
            .clone()
            .or_else(|| data.title().map(str::to_string));

        let mut page = SourcePage::new(url, identity::content_hash(&fetched.markdown))
            .with_page_types(classify_page(url, title.as_deref(), &fetched.markdown, &data))
            .with_languages(detect_languages(&fetched.markdown))
            .with_crawled_at(now);
        if let Some(title) = title {
            page = page.with_title(title);
        }
        if !self.config.dry_run {
            let written = snapshots.put(&source_page_id, url, &fetched.markdown, fetched.html.as_deref(), now)?;
            page = page.with_snapshot_ref(written.snapshot_ref);
        }

        let upsert = writer.upsert_source_page(page);
        if upsert == PageUpsert::Unchanged && self.config.refresh != RefreshPolicy::All {
            info!(url = %url, "Unchanged");
            report.counters.pages_unchanged += 1;
            return Ok(UrlOutcome::Unchanged);
        }
        if let PageUpsert::Updated { previous_hash } = &upsert {
            debug!(url = %url, previous_hash = %previous_hash, "Content changed");
        }

        let source = ClaimSource::new(url, &source_page_id, ctx.service_id, ctx.service_key).with_retrieved_at(now);
        let added = writer.upsert_claims(build_claims(&data, &source));

        let counters = &mut report.counters;
        counters.pages_kept += 1;
        counters.steps += data.steps.len();
        counters.fees += data.fee_table.len();
        counters.faqs += data.faq_pairs.len();
        counters.docs_found += data.document_list.len();
        counters.claims_added += added;

        info!(
            url = %url,
            steps = data.steps.len(),
            fees = data.fee_table.len(),
            faqs = data.faq_pairs.len(),
            documents = data.document_list.len(),
            claims_added = added,
            "Page processed"
        );
        Ok(if upsert == PageUpsert::Unchanged {
            UrlOutcome::Unchanged
        } else {
            UrlOutcome::Kept
        })
    }
}

struct PageContext<'a> {
    url: &'a str,
    service_id: &'a str,
    service_key: &'a str,
}

fn log_domain_summary(report: &DomainReport) {
    let c = &report.counters;
    match report.failure_reason {
        Some(reason) => warn!(
            domain = %report.domain,
            reason = reason.as_str(),
            message = report.failure_message.as_deref().unwrap_or_default(),
            "Domain failed"
        ),
        None => info!(
            domain = %report.domain,
            pages = c.pages_kept,
            unchanged = c.pages_unchanged,
            steps = c.steps,
            fees = c.fees,
            faqs = c.faqs,
            docs = c.docs_found,
            claims = c.claims_added,
            errors = c.errors,
            "Domain summary"
        ),
    }
}
