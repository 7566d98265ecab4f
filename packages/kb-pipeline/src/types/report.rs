//! Crawl run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::config::RefreshPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Where a failed run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Startup,
    Seeds,
    Domain,
    Finalize,
}

/// Bucket a domain-fatal failure is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    FirecrawlUnavailable,
    FirecrawlMapFailed,
    OtherError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirecrawlUnavailable => "firecrawl_unavailable",
            Self::FirecrawlMapFailed => "firecrawl_map_failed",
            Self::OtherError => "other_error",
        }
    }
}

/// Page and claim counters, per domain and aggregated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub pages_seen: usize,
    pub pages_kept: usize,
    pub pages_unchanged: usize,
    pub pages_excluded: usize,
    pub pages_skipped: usize,
    pub docs_found: usize,
    pub steps: usize,
    pub fees: usize,
    pub faqs: usize,
    pub claims_added: usize,
    pub errors: usize,
}

impl std::ops::AddAssign for RunCounters {
    fn add_assign(&mut self, other: Self) {
        self.pages_seen += other.pages_seen;
        self.pages_kept += other.pages_kept;
        self.pages_unchanged += other.pages_unchanged;
        self.pages_excluded += other.pages_excluded;
        self.pages_skipped += other.pages_skipped;
        self.docs_found += other.docs_found;
        self.steps += other.steps;
        self.fees += other.fees;
        self.faqs += other.faqs;
        self.claims_added += other.claims_added;
        self.errors += other.errors;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlError {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: String,
    pub service_id: String,
    pub counters: RunCounters,
    #[serde(default)]
    pub errors: Vec<UrlError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl DomainReport {
    pub fn new(domain: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service_id: service_id.into(),
            counters: RunCounters::default(),
            errors: Vec::new(),
            failure_reason: None,
            failure_message: None,
        }
    }

    pub fn record_error(&mut self, url: impl Into<String>, message: impl Into<String>) {
        self.counters.errors += 1;
        self.errors.push(UrlError {
            url: url.into(),
            message: message.into(),
        });
    }

    pub fn failed(&self) -> bool {
        self.failure_reason.is_some()
    }
}

/// Machine-readable summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub refresh: RefreshPolicy,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_stage: Option<FailureStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_domain: Option<String>,
    pub totals: RunCounters,
    pub domains: Vec<DomainReport>,
    pub domains_failed_reasons: BTreeMap<FailureReason, usize>,
}

impl RunReport {
    pub fn start(refresh: RefreshPolicy, dry_run: bool) -> Self {
        Self {
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            refresh,
            dry_run,
            failure_stage: None,
            failure_message: None,
            current_domain: None,
            totals: RunCounters::default(),
            domains: Vec::new(),
            domains_failed_reasons: BTreeMap::new(),
        }
    }

    /// Fold a finished domain into the totals.
    pub fn push_domain(&mut self, domain: DomainReport) {
        self.totals += domain.counters;
        if let Some(reason) = domain.failure_reason {
            *self.domains_failed_reasons.entry(reason).or_default() += 1;
        }
        self.domains.push(domain);
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.current_domain = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, stage: FailureStage, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.failure_stage = Some(stage);
        self.failure_message = Some(message.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn domains_failed(&self) -> usize {
        self.domains_failed_reasons.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_domain_aggregates() {
        let mut report = RunReport::start(RefreshPolicy::Changed, false);

        let mut ok = DomainReport::new("epassport.gov.bd", "svc.epassport");
        ok.counters.pages_kept = 3;
        ok.counters.claims_added = 10;
        ok.record_error("https://www.epassport.gov.bd/x", "scrape failed");
        report.push_domain(ok);

        let mut bad = DomainReport::new("nidw.gov.bd", "svc.nid");
        bad.failure_reason = Some(FailureReason::FirecrawlMapFailed);
        report.push_domain(bad);

        assert_eq!(report.totals.pages_kept, 3);
        assert_eq!(report.totals.claims_added, 10);
        assert_eq!(report.totals.errors, 1);
        assert_eq!(report.domains_failed(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["domains_failed_reasons"]["firecrawl_map_failed"], 1);
        assert_eq!(json["status"], "running");
    }

    #[test]
    fn test_fail_sets_stage() {
        let mut report = RunReport::start(RefreshPolicy::All, true);
        report.current_domain = Some("bdris.gov.bd".into());
        report.fail(FailureStage::Startup, "no fetcher");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure_stage"], "startup");
        assert_eq!(json["current_domain"], "bdris.gov.bd");
    }
}
