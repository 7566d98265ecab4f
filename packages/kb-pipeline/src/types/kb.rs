//! The KB document and its registry entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::claim::Claim;
use crate::types::page::SourcePage;

pub const SCHEMA_VERSION: &str = "3.0";

/// A government body that owns one or more services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub agency_id: String,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

/// A citizen-facing service; claims point at it through `entity_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: String,
    pub agency_id: String,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl Service {
    /// The `svc.` suffix.
    pub fn service_key(&self) -> &str {
        self.service_id
            .strip_prefix("svc.")
            .unwrap_or(&self.service_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideStep {
    pub title: String,
    pub claim_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideSection {
    pub section_id: String,
    pub title: String,
    pub claim_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideVariant {
    pub variant_id: String,
    pub label: String,
    pub claim_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialLink {
    pub label: String,
    pub url: String,
}

/// Publishable aggregation of claim ids for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceGuide {
    pub guide_id: String,
    pub service_id: String,
    pub agency_id: String,
    pub title: String,
    #[serde(default)]
    pub steps: Vec<GuideStep>,
    #[serde(default)]
    pub sections: Vec<GuideSection>,
    #[serde(default)]
    pub variants: Vec<GuideVariant>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub fees: Vec<String>,
    #[serde(default)]
    pub official_links: Vec<OfficialLink>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceGuide {
    /// Every claim id referenced anywhere in the guide, in first-seen order.
    pub fn referenced_claim_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.steps
            .iter()
            .flat_map(|s| s.claim_ids.iter())
            .chain(self.sections.iter().flat_map(|s| s.claim_ids.iter()))
            .chain(self.variants.iter().flat_map(|v| v.claim_ids.iter()))
            .chain(self.required_documents.iter())
            .chain(self.fees.iter())
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// One entry per KB save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbChange {
    pub at: DateTime<Utc>,
    pub data_version: u64,
    pub summary: String,
}

/// The single top-level KB document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(rename = "$schema_version")]
    pub schema_version: String,
    pub data_version: u64,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agencies: Vec<Agency>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub service_guides: Vec<ServiceGuide>,
    #[serde(default)]
    pub source_pages: Vec<SourcePage>,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default)]
    pub change_log: Vec<KbChange>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            data_version: 0,
            last_updated_at: None,
            agencies: Vec::new(),
            services: Vec::new(),
            service_guides: Vec::new(),
            source_pages: Vec::new(),
            claims: Vec::new(),
            change_log: Vec::new(),
        }
    }
}

impl KnowledgeBase {
    pub fn source_page(&self, source_page_id: &str) -> Option<&SourcePage> {
        self.source_pages
            .iter()
            .find(|p| p.source_page_id == source_page_id)
    }

    pub fn claims_for_service<'a>(&'a self, service_id: &'a str) -> impl Iterator<Item = &'a Claim> {
        self.claims
            .iter()
            .filter(move |c| c.entity_ref.id == service_id)
    }
}
