//! Public guide builder.
//!
//! Projects the KB's service guides into reader-facing documents. Every
//! claim reference is resolved into its content plus citations, so the
//! output never carries claim ids.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kb_pipeline::pipeline::publish::{build_public_guides, resolve_generated_at};
//!
//! let generated_at = resolve_generated_at(std::env::var("SOURCE_TIMESTAMP").ok().as_deref(), &kb);
//! let outputs = build_public_guides(&kb, generated_at);
//! outputs.validate()?;
//! outputs.write(&paths.published_dir())?;
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::error::{KbResult, ValidationError};
use crate::identity;
use crate::pipeline::validate;
use crate::stores::write_json_atomic;
use crate::types::claim::{Citation, Claim, ClaimPayload, ClaimStatus};
use crate::types::guide::{
    AgencyIndexEntry, GuideIndexEntry, GuideMeta, PublicCitation, PublicDocument, PublicFee,
    PublicGuide, PublicGuides, PublicGuidesIndex, PublicItem, PublicLink, PublicSection,
    PublicStep, PublicVariant, VerificationSummary,
};
use crate::types::kb::{KnowledgeBase, ServiceGuide};

pub const PUBLIC_GUIDES_FILE: &str = "public_guides.json";
pub const PUBLIC_GUIDES_INDEX_FILE: &str = "public_guides_index.json";
pub const PUBLIC_GUIDES_SCHEMA_FILE: &str = "public_guides.schema.json";

/// `generated_at` for published outputs: `SOURCE_TIMESTAMP` (RFC 3339 or
/// epoch seconds), else the KB's `last_updated_at`, else now.
pub fn resolve_generated_at(source_timestamp: Option<&str>, kb: &KnowledgeBase) -> DateTime<Utc> {
    if let Some(raw) = source_timestamp.map(str::trim).filter(|s| !s.is_empty()) {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return at.with_timezone(&Utc);
        }
        if let Some(at) = raw.parse::<i64>().ok().and_then(|s| Utc.timestamp_opt(s, 0).single()) {
            return at;
        }
        tracing::warn!(value = %raw, "Ignoring unparseable SOURCE_TIMESTAMP");
    }
    kb.last_updated_at.unwrap_or_else(Utc::now)
}

/// Lookup helpers over one KB.
struct Resolver<'a> {
    kb: &'a KnowledgeBase,
    claims: BTreeMap<&'a str, &'a Claim>,
}

impl<'a> Resolver<'a> {
    fn new(kb: &'a KnowledgeBase) -> Self {
        Self {
            kb,
            claims: kb.claims.iter().map(|c| (c.claim_id.as_str(), c)).collect(),
        }
    }

    fn claim(&self, guide_id: &str, claim_id: &str) -> Option<&'a Claim> {
        let claim = self.claims.get(claim_id).copied();
        if claim.is_none() {
            tracing::warn!(guide_id = %guide_id, claim_id = %claim_id, "Guide references unknown claim");
        }
        claim
    }

    fn citation(&self, citation: &Citation) -> PublicCitation {
        let page = self.kb.source_page(&citation.source_page_id);
        PublicCitation {
            source_page_id: citation.source_page_id.clone(),
            canonical_url: citation.canonical_url.clone(),
            domain: page
                .map(|p| p.domain.clone())
                .or_else(|| identity::domain_of(&citation.canonical_url))
                .unwrap_or_default(),
            page_title: page.and_then(|p| p.title.clone()),
            quoted_text: citation.quoted_text.clone(),
            locator: citation.locator.render(),
            retrieved_at: citation.retrieved_at,
            language: citation.language,
        }
    }

    fn citations(&self, claims: &[&Claim]) -> Vec<PublicCitation> {
        claims
            .iter()
            .flat_map(|c| c.citations.iter())
            .map(|c| self.citation(c))
            .collect()
    }

    fn fee(&self, claim: &Claim) -> Option<PublicFee> {
        match &claim.structured_data {
            ClaimPayload::Fee {
                label,
                amount,
                currency,
                variant,
            } => Some(PublicFee {
                label: label.clone(),
                amount: *amount,
                currency: currency.clone(),
                variant: variant.clone(),
                citations: self.citations(&[claim]),
            }),
            _ => None,
        }
    }

    fn fees(&self, guide_id: &str, ids: &[String]) -> Vec<PublicFee> {
        ids.iter()
            .filter_map(|id| self.claim(guide_id, id))
            .filter_map(|c| self.fee(c))
            .collect()
    }

    fn item(&self, claim: &Claim) -> PublicItem {
        let (text, detail, link) = match &claim.structured_data {
            ClaimPayload::Faq {
                question,
                answer,
                link,
            } => (question.clone(), answer.clone(), link.clone()),
            ClaimPayload::Document { url, text } => (
                text.clone().unwrap_or_else(|| url.clone()),
                None,
                Some(url.clone()),
            ),
            _ => (claim.text.clone(), None, None),
        };
        PublicItem {
            text,
            detail,
            link,
            citations: self.citations(&[claim]),
        }
    }

    fn guide(&self, guide: &ServiceGuide) -> PublicGuide {
        let id = guide.guide_id.as_str();

        let mut steps = Vec::with_capacity(guide.steps.len());
        for step in &guide.steps {
            let claims: Vec<&Claim> = step
                .claim_ids
                .iter()
                .filter_map(|cid| self.claim(id, cid))
                .collect();
            if claims.is_empty() {
                continue;
            }
            let description = claims.iter().find_map(|c| match &c.structured_data {
                ClaimPayload::Step { description, .. } => description.clone(),
                _ => None,
            });
            steps.push(PublicStep {
                step_number: steps.len() as u32 + 1,
                title: step.title.clone(),
                description,
                citations: self.citations(&claims),
            });
        }

        let sections = guide
            .sections
            .iter()
            .map(|section| PublicSection {
                section_id: section.section_id.clone(),
                title: section.title.clone(),
                items: section
                    .claim_ids
                    .iter()
                    .filter_map(|cid| self.claim(id, cid))
                    .map(|c| self.item(c))
                    .collect(),
            })
            .collect();

        let variants = guide
            .variants
            .iter()
            .map(|v| PublicVariant {
                variant_id: v.variant_id.clone(),
                label: v.label.clone(),
                fees: self.fees(id, &v.claim_ids),
            })
            .collect();

        let required_documents = guide
            .required_documents
            .iter()
            .filter_map(|cid| self.claim(id, cid))
            .filter_map(|c| match &c.structured_data {
                ClaimPayload::Document { url, text } => Some(PublicDocument {
                    title: text.clone().unwrap_or_else(|| url.clone()),
                    url: url.clone(),
                    citations: self.citations(&[c]),
                }),
                _ => None,
            })
            .collect();

        let agency_name = self
            .kb
            .agencies
            .iter()
            .find(|a| a.agency_id == guide.agency_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| guide.agency_id.clone());

        PublicGuide {
            guide_id: guide.guide_id.clone(),
            service_id: guide.service_id.clone(),
            agency_id: guide.agency_id.clone(),
            agency_name,
            title: guide.title.clone(),
            meta: self.meta(guide, steps.len()),
            steps,
            sections,
            variants,
            required_documents,
            fees: self.fees(id, &guide.fees),
            official_links: guide
                .official_links
                .iter()
                .map(|l| PublicLink {
                    label: l.label.clone(),
                    url: l.url.clone(),
                })
                .collect(),
            keywords: guide.keywords.clone(),
            updated_at: guide.updated_at,
        }
    }

    fn meta(&self, guide: &ServiceGuide, total_steps: usize) -> GuideMeta {
        let claims: Vec<&Claim> = guide
            .referenced_claim_ids()
            .into_iter()
            .filter_map(|cid| self.claims.get(cid).copied())
            .collect();

        let mut summary = VerificationSummary::default();
        for claim in &claims {
            match claim.status {
                ClaimStatus::Verified => summary.verified += 1,
                ClaimStatus::Unverified => summary.unverified += 1,
                ClaimStatus::Stale => summary.stale += 1,
                ClaimStatus::Deprecated => summary.deprecated += 1,
                ClaimStatus::Contradicted => summary.contradicted += 1,
            }
        }

        let mut pages = HashSet::new();
        let mut domains = BTreeSet::new();
        let mut last_crawled_at = None;
        for citation in claims.iter().flat_map(|c| c.citations.iter()) {
            if !pages.insert(citation.source_page_id.as_str()) {
                continue;
            }
            match self.kb.source_page(&citation.source_page_id) {
                Some(page) => {
                    domains.insert(page.domain.clone());
                    last_crawled_at = last_crawled_at.max(Some(page.last_crawled_at));
                }
                None => {
                    if let Some(domain) = identity::domain_of(&citation.canonical_url) {
                        domains.insert(domain);
                    }
                }
            }
        }

        GuideMeta {
            total_steps,
            total_citations: claims.iter().map(|c| c.citations.len()).sum(),
            verification_summary: summary,
            last_crawled_at,
            source_domains: domains.into_iter().collect(),
        }
    }
}

/// Everything `build_public_guides` produces.
#[derive(Debug, Clone)]
pub struct PublishedOutputs {
    pub guides: PublicGuides,
    pub index: PublicGuidesIndex,
    pub schema: Value,
}

/// Build guides, index and schema from a KB. Pure: no I/O.
pub fn build_public_guides(kb: &KnowledgeBase, generated_at: DateTime<Utc>) -> PublishedOutputs {
    let resolver = Resolver::new(kb);
    let guides: Vec<PublicGuide> = kb.service_guides.iter().map(|g| resolver.guide(g)).collect();

    let mut agencies: Vec<AgencyIndexEntry> = Vec::new();
    let mut keywords: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for guide in &guides {
        match agencies.iter_mut().find(|a| a.agency_id == guide.agency_id) {
            Some(entry) => entry.guide_ids.push(guide.guide_id.clone()),
            None => agencies.push(AgencyIndexEntry {
                agency_id: guide.agency_id.clone(),
                name: guide.agency_name.clone(),
                guide_ids: vec![guide.guide_id.clone()],
            }),
        }
        for keyword in &guide.keywords {
            let ids = keywords.entry(keyword.clone()).or_default();
            if !ids.contains(&guide.guide_id) {
                ids.push(guide.guide_id.clone());
            }
        }
    }

    let index = PublicGuidesIndex {
        generated_at,
        guides: guides
            .iter()
            .map(|g| GuideIndexEntry {
                guide_id: g.guide_id.clone(),
                title: g.title.clone(),
                service_id: g.service_id.clone(),
                agency_id: g.agency_id.clone(),
                keywords: g.keywords.clone(),
            })
            .collect(),
        agencies,
        keywords,
    };

    tracing::info!(
        guides = guides.len(),
        data_version = kb.data_version,
        generated_at = %generated_at.to_rfc3339(),
        "Built public guides"
    );

    PublishedOutputs {
        guides: PublicGuides {
            generated_at,
            data_version: kb.data_version,
            guides,
        },
        index,
        schema: public_guides_schema(),
    }
}

impl PublishedOutputs {
    /// Structural, contract and semantic checks over the serialized outputs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let guides = serde_json::to_value(&self.guides).unwrap_or(Value::Null);
        let index = serde_json::to_value(&self.index).unwrap_or(Value::Null);
        validate::validate_outputs(&guides, &index, &self.schema)
    }

    /// Write the three files into `dir`, each atomically.
    pub fn write(&self, dir: &Path) -> KbResult<()> {
        write_json_atomic(&dir.join(PUBLIC_GUIDES_FILE), &self.guides)?;
        write_json_atomic(&dir.join(PUBLIC_GUIDES_INDEX_FILE), &self.index)?;
        write_json_atomic(&dir.join(PUBLIC_GUIDES_SCHEMA_FILE), &self.schema)?;
        tracing::info!(dir = %dir.display(), "Published guides written");
        Ok(())
    }
}

/// JSON Schema (draft 2020-12) for `public_guides.json`.
pub fn public_guides_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://bangladesh.gov.bd/schemas/public_guides.schema.json",
        "title": "Public service guides",
        "type": "object",
        "required": ["generated_at", "data_version", "guides"],
        "properties": {
            "generated_at": {"type": "string", "format": "date-time"},
            "data_version": {"type": "integer", "minimum": 0},
            "guides": {"type": "array", "items": {"$ref": "#/$defs/guide"}}
        },
        "$defs": {
            "citation": citation_schema(),
            "fee": fee_schema(),
            "step": step_schema(),
            "item": item_schema(),
            "guide": guide_schema()
        }
    })
}

fn cited() -> Value {
    json!({"type": "array", "items": {"$ref": "#/$defs/citation"}})
}

fn array_of(items: Value) -> Value {
    json!({"type": "array", "items": items})
}

fn citation_schema() -> Value {
    json!({
        "type": "object",
        "required": ["source_page_id", "canonical_url", "domain", "quoted_text", "locator", "retrieved_at", "language"],
        "properties": {
            "source_page_id": {"type": "string"},
            "canonical_url": {"type": "string", "format": "uri"},
            "domain": {"type": "string"},
            "page_title": {"type": "string"},
            "quoted_text": {"type": "string", "maxLength": 300},
            "locator": {"type": "string"},
            "retrieved_at": {"type": "string", "format": "date-time"},
            "language": {"type": "string", "enum": ["en", "bn"]}
        }
    })
}

fn fee_schema() -> Value {
    json!({
        "type": "object",
        "required": ["label", "amount", "currency", "citations"],
        "properties": {
            "label": {"type": "string"},
            "amount": {"type": "number"},
            "currency": {"type": "string"},
            "variant": {"type": "string"},
            "citations": cited()
        }
    })
}

fn step_schema() -> Value {
    json!({
        "type": "object",
        "required": ["step_number", "title", "citations"],
        "properties": {
            "step_number": {"type": "integer", "minimum": 1},
            "title": {"type": "string"},
            "description": {"type": "string"},
            "citations": cited()
        }
    })
}

fn item_schema() -> Value {
    json!({
        "type": "object",
        "required": ["text", "citations"],
        "properties": {
            "text": {"type": "string"},
            "detail": {"type": "string"},
            "link": {"type": "string"},
            "citations": cited()
        }
    })
}

fn section_schema() -> Value {
    json!({
        "type": "object",
        "required": ["section_id", "title", "items"],
        "properties": {
            "section_id": {"type": "string"},
            "title": {"type": "string"},
            "items": {"type": "array", "items": {"$ref": "#/$defs/item"}}
        }
    })
}

fn variant_schema() -> Value {
    json!({
        "type": "object",
        "required": ["variant_id", "label", "fees"],
        "properties": {
            "variant_id": {"type": "string"},
            "label": {"type": "string"},
            "fees": {"type": "array", "items": {"$ref": "#/$defs/fee"}}
        }
    })
}

fn document_schema() -> Value {
    json!({
        "type": "object",
        "required": ["title", "url", "citations"],
        "properties": {
            "title": {"type": "string"},
            "url": {"type": "string", "format": "uri"},
            "citations": cited()
        }
    })
}

fn link_schema() -> Value {
    json!({
        "type": "object",
        "required": ["label", "url"],
        "properties": {
            "label": {"type": "string"},
            "url": {"type": "string", "format": "uri"}
        }
    })
}

fn meta_schema() -> Value {
    json!({
        "type": "object",
        "required": ["total_steps", "total_citations", "verification_summary", "source_domains"],
        "properties": {
            "total_steps": {"type": "integer", "minimum": 0},
            "total_citations": {"type": "integer", "minimum": 0},
            "verification_summary": {
                "type": "object",
                "required": ["verified", "unverified", "stale", "deprecated", "contradicted"]
            },
            "last_crawled_at": {"type": ["string", "null"], "format": "date-time"},
            "source_domains": {"type": "array", "items": {"type": "string"}}
        }
    })
}

fn guide_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "guide_id", "service_id", "agency_id", "agency_name", "title", "steps",
            "sections", "variants", "required_documents", "fees", "official_links",
            "keywords", "updated_at", "meta"
        ],
        "properties": {
            "guide_id": {"type": "string", "pattern": "^guide\\."},
            "service_id": {"type": "string"},
            "agency_id": {"type": "string"},
            "agency_name": {"type": "string"},
            "title": {"type": "string"},
            "steps": {"type": "array", "items": {"$ref": "#/$defs/step"}},
            "sections": array_of(section_schema()),
            "variants": array_of(variant_schema()),
            "required_documents": array_of(document_schema()),
            "fees": {"type": "array", "items": {"$ref": "#/$defs/fee"}},
            "official_links": array_of(link_schema()),
            "keywords": {"type": "array", "items": {"type": "string"}},
            "updated_at": {"type": "string", "format": "date-time"},
            "meta": meta_schema()
        }
    })
}
