//! Service guide assembly.
//!
//! A guide aggregates claim ids for one service. Assembly is additive:
//! an existing guide keeps its order and content, and claims it does not
//! reference yet are appended to the matching part.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::identity::ClaimType;
use crate::stores::KbWriter;
use crate::types::claim::{Claim, ClaimPayload};
use crate::types::extracted::FeeVariant;
use crate::types::kb::{GuideSection, GuideStep, GuideVariant, KnowledgeBase, OfficialLink, Service, ServiceGuide};

pub const FAQ_SECTION_ID: &str = "section.faq";
pub const FAQ_SECTION_TITLE: &str = "Frequently Asked Questions";

const VARIANTS: [FeeVariant; 4] = [
    FeeVariant::Regular,
    FeeVariant::Express,
    FeeVariant::SuperExpress,
    FeeVariant::Emergency,
];

pub fn guide_id_for(service: &Service) -> String {
    format!("guide.{}", service.service_key())
}

fn variant_label(variant_id: &str) -> String {
    VARIANTS
        .iter()
        .find(|v| v.as_str() == variant_id)
        .map(|v| v.label().to_string())
        .unwrap_or_else(|| variant_id.replace('_', " "))
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Build or extend the guide for `service` from its claims in KB order.
///
/// Returns `None` when nothing changed.
pub fn assemble_guide(
    kb: &KnowledgeBase,
    service: &Service,
    existing: Option<&ServiceGuide>,
    at: DateTime<Utc>,
) -> Option<ServiceGuide> {
    let claims: Vec<&Claim> = kb.claims_for_service(&service.service_id).collect();
    if claims.is_empty() && existing.is_none() {
        return None;
    }

    let agency_id = service.agency_id.clone();
    let mut guide = existing.cloned().unwrap_or_else(|| ServiceGuide {
        guide_id: guide_id_for(service),
        service_id: service.service_id.clone(),
        agency_id,
        title: service.name.clone(),
        steps: Vec::new(),
        sections: Vec::new(),
        variants: Vec::new(),
        required_documents: Vec::new(),
        fees: Vec::new(),
        official_links: Vec::new(),
        keywords: Vec::new(),
        updated_at: at,
    });
    let before = guide.clone();

    let referenced: HashSet<String> = guide
        .referenced_claim_ids()
        .into_iter()
        .map(str::to_string)
        .collect();

    for claim in claims.iter().filter(|c| !referenced.contains(&c.claim_id)) {
        let id = claim.claim_id.as_str();
        match (&claim.claim_type, &claim.structured_data) {
            (ClaimType::Step, ClaimPayload::Step { title, .. }) => {
                guide.steps.push(GuideStep {
                    title: title.clone(),
                    claim_ids: vec![id.to_string()],
                });
            }
            (ClaimType::Fee, ClaimPayload::Fee { variant, .. }) => {
                push_unique(&mut guide.fees, id);
                if let Some(variant_id) = variant {
                    match guide.variants.iter_mut().find(|v| &v.variant_id == variant_id) {
                        Some(group) => push_unique(&mut group.claim_ids, id),
                        None => guide.variants.push(GuideVariant {
                            variant_id: variant_id.clone(),
                            label: variant_label(variant_id),
                            claim_ids: vec![id.to_string()],
                        }),
                    }
                }
            }
            (ClaimType::Faq, _) => {
                let section = match guide.sections.iter().position(|s| s.section_id == FAQ_SECTION_ID) {
                    Some(pos) => &mut guide.sections[pos],
                    None => {
                        guide.sections.push(GuideSection {
                            section_id: FAQ_SECTION_ID.to_string(),
                            title: FAQ_SECTION_TITLE.to_string(),
                            claim_ids: Vec::new(),
                        });
                        let last = guide.sections.len() - 1;
                        &mut guide.sections[last]
                    }
                };
                push_unique(&mut section.claim_ids, id);
            }
            (ClaimType::DocumentRequirement, _) => push_unique(&mut guide.required_documents, id),
            (claim_type, _) => {
                tracing::warn!(claim_id = %id, claim_type = %claim_type, "Claim payload does not match its type");
            }
        }
    }

    // Official links: every page the service's claims cite.
    let mut seen_pages = HashSet::new();
    for page_id in claims.iter().flat_map(|c| c.cited_pages()) {
        if !seen_pages.insert(page_id) {
            continue;
        }
        if let Some(page) = kb.source_page(page_id) {
            if !guide.official_links.iter().any(|l| l.url == page.canonical_url) {
                guide.official_links.push(OfficialLink {
                    label: page.title.clone().unwrap_or_else(|| page.canonical_url.clone()),
                    url: page.canonical_url.clone(),
                });
            }
        }
    }

    push_unique(&mut guide.keywords, service.service_key());
    push_unique(&mut guide.keywords, &service.name.to_lowercase());
    for page in guide
        .official_links
        .iter()
        .filter_map(|l| kb.source_pages.iter().find(|p| p.canonical_url == l.url))
        .collect::<Vec<_>>()
    {
        for page_type in &page.page_type {
            if let Ok(serde_json::Value::String(tag)) = serde_json::to_value(page_type) {
                if tag != "general" {
                    push_unique(&mut guide.keywords, &tag);
                }
            }
        }
    }

    if guide == before && existing.is_some() {
        return None;
    }
    guide.updated_at = at;
    Some(guide)
}

/// Refresh the guides of the given services. Returns the number changed.
pub fn refresh_guides(writer: &mut KbWriter, service_ids: &[String], at: DateTime<Utc>) -> usize {
    let mut updated = Vec::new();
    for service_id in service_ids {
        let Some(service) = writer.service(service_id) else {
            continue;
        };
        let existing = writer.guide(&guide_id_for(service));
        if let Some(guide) = assemble_guide(writer.kb(), service, existing, at) {
            updated.push(guide);
        }
    }

    let count = updated.len();
    for guide in updated {
        tracing::debug!(guide_id = %guide.guide_id, steps = guide.steps.len(), fees = guide.fees.len(), "Guide assembled");
        writer.upsert_guide(guide);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor;
    use crate::pipeline::claims::{build_claims, ClaimSource};
    use crate::types::page::SourcePage;

    const URL: &str = "https://www.epassport.gov.bd/instructions/passport-fees";
    const PAGE: &str = "# Passport Fees\n\
        1. Visit the portal\n\
        2. Fill the form\n\
        ### Regular delivery\n\
        - Fee: 4,025 BDT\n\
        ### Express Service\n\
        - Fee: 6,900 BDT\n\
        - Fee: 8,050 BDT\n\
        ### How long does it take?\n\
        It takes 15 working days.\n";

    fn writer_with_page(dir: &std::path::Path, markdown: &str) -> (KbWriter, String) {
        let mut writer = KbWriter::load(dir.join("kb.json")).unwrap();
        let service_id = writer.ensure_service("www.epassport.gov.bd", "e-Passport");
        let page = SourcePage::new(URL, "hash").with_title("Passport Fees");
        let page_id = page.source_page_id.clone();
        writer.upsert_source_page(page);
        let source = ClaimSource::new(URL, &page_id, &service_id, "epassport");
        writer.upsert_claims(build_claims(&extractor::extract(markdown, URL, None), &source));
        (writer, service_id)
    }

    #[test]
    fn test_assemble_new_guide() {
        let dir = tempfile::tempdir().unwrap();
        let (mut writer, service_id) = writer_with_page(dir.path(), PAGE);
        assert_eq!(refresh_guides(&mut writer, &[service_id], Utc::now()), 1);

        let guide = writer.guide("guide.epassport").unwrap();
        assert_eq!(guide.title, "e-Passport");
        assert_eq!(guide.steps.len(), 2);
        assert_eq!(guide.steps[0].title, "Visit the portal");
        assert_eq!(guide.fees.len(), 3);
        let variants: Vec<(&str, usize)> = guide
            .variants
            .iter()
            .map(|v| (v.variant_id.as_str(), v.claim_ids.len()))
            .collect();
        assert_eq!(variants, vec![("regular", 1), ("express", 2)]);
        assert_eq!(guide.sections[0].section_id, FAQ_SECTION_ID);
        assert_eq!(guide.official_links[0].url, URL);
        assert_eq!(guide.official_links[0].label, "Passport Fees");
        assert_eq!(guide.keywords[0], "epassport");
    }

    #[test]
    fn test_refresh_is_additive_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut writer, service_id) = writer_with_page(dir.path(), PAGE);
        refresh_guides(&mut writer, std::slice::from_ref(&service_id), Utc::now());
        let first = writer.guide("guide.epassport").unwrap().clone();

        assert_eq!(refresh_guides(&mut writer, std::slice::from_ref(&service_id), Utc::now()), 0);

        let page_id = crate::identity::source_page_id(URL);
        let source = ClaimSource::new(URL, &page_id, &service_id, "epassport");
        writer.upsert_claims(build_claims(
            &extractor::extract("### Super Express\n- Fee: 13,800 BDT\n", URL, None),
            &source,
        ));
        assert_eq!(refresh_guides(&mut writer, &[service_id], Utc::now()), 1);

        let second = writer.guide("guide.epassport").unwrap();
        assert_eq!(second.fees[..3], first.fees[..]);
        assert_eq!(second.fees.len(), 4);
        assert_eq!(second.variants.last().unwrap().label, "Super Express");
    }
}
