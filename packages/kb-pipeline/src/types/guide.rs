//! Reader-facing guide documents.
//!
//! These types never carry claim ids: every claim reference in a
//! [`ServiceGuide`](crate::types::kb::ServiceGuide) is resolved into
//! content plus citations before it reaches this layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::page::Language;

/// A resolved citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicCitation {
    pub source_page_id: String,
    pub canonical_url: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    pub quoted_text: String,
    /// Rendered locator, e.g. `Fees > Express`
    pub locator: String,
    pub retrieved_at: DateTime<Utc>,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicStep {
    pub step_number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub citations: Vec<PublicCitation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicFee {
    pub label: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub citations: Vec<PublicCitation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicDocument {
    pub title: String,
    pub url: String,
    pub citations: Vec<PublicCitation>,
}

/// A section entry: a FAQ pair or any other resolved claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub citations: Vec<PublicCitation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicSection {
    pub section_id: String,
    pub title: String,
    pub items: Vec<PublicItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicVariant {
    pub variant_id: String,
    pub label: String,
    pub fees: Vec<PublicFee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLink {
    pub label: String,
    pub url: String,
}

/// Claim counts by verification status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub verified: usize,
    pub unverified: usize,
    pub stale: usize,
    pub deprecated: usize,
    pub contradicted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideMeta {
    pub total_steps: usize,
    pub total_citations: usize,
    pub verification_summary: VerificationSummary,
    #[serde(default)]
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub source_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicGuide {
    pub guide_id: String,
    pub service_id: String,
    pub agency_id: String,
    pub agency_name: String,
    pub title: String,
    pub steps: Vec<PublicStep>,
    pub sections: Vec<PublicSection>,
    pub variants: Vec<PublicVariant>,
    pub required_documents: Vec<PublicDocument>,
    pub fees: Vec<PublicFee>,
    pub official_links: Vec<PublicLink>,
    pub keywords: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub meta: GuideMeta,
}

/// `public_guides.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicGuides {
    pub generated_at: DateTime<Utc>,
    pub data_version: u64,
    pub guides: Vec<PublicGuide>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideIndexEntry {
    pub guide_id: String,
    pub title: String,
    pub service_id: String,
    pub agency_id: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyIndexEntry {
    pub agency_id: String,
    pub name: String,
    pub guide_ids: Vec<String>,
}

/// `public_guides_index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicGuidesIndex {
    pub generated_at: DateTime<Utc>,
    pub guides: Vec<GuideIndexEntry>,
    pub agencies: Vec<AgencyIndexEntry>,
    /// keyword → guide ids
    pub keywords: BTreeMap<String, Vec<String>>,
}
