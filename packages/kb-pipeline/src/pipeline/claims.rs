//! Claim derivation from extractor output.
//!
//! Each extracted item becomes one claim whose id is a pure function of
//! the page URL, claim type, locator and a normalized payload projection.
//! Display-only fields (tags, status, timestamps) stay out of the
//! fingerprint, so re-extracting the same content yields the same ids.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::extractor::bengali::contains_bengali;
use crate::extractor::primary_language;
use crate::identity::{self, ClaimType};
use crate::types::claim::{Citation, Claim, ClaimPayload, ClaimStatus, EntityRef, Locator};
use crate::types::extracted::{ExtractedData, ExtractedDocument, ExtractedFaq, ExtractedFee, ExtractedStep};

pub const TAG_AUTO_EXTRACTED: &str = "auto_extracted";
pub const TAG_BENGALI: &str = "bengali";

/// Where the extracted data came from.
#[derive(Debug, Clone)]
pub struct ClaimSource<'a> {
    pub canonical_url: &'a str,
    pub source_page_id: &'a str,
    pub service_id: &'a str,
    pub service_key: &'a str,
    pub retrieved_at: DateTime<Utc>,
}

impl<'a> ClaimSource<'a> {
    pub fn new(canonical_url: &'a str, source_page_id: &'a str, service_id: &'a str, service_key: &'a str) -> Self {
        Self {
            canonical_url,
            source_page_id,
            service_id,
            service_key,
            retrieved_at: Utc::now(),
        }
    }

    pub fn with_retrieved_at(mut self, at: DateTime<Utc>) -> Self {
        self.retrieved_at = at;
        self
    }
}

/// Render an amount for fingerprints and display: integral values without a fraction.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

struct Draft {
    claim_type: ClaimType,
    locator: Locator,
    payload_fp: String,
    text: String,
    quoted: String,
    payload: ClaimPayload,
}

impl Draft {
    fn step(step: &ExtractedStep) -> Self {
        Self {
            claim_type: ClaimType::Step,
            locator: Locator::heading_path(&step.heading_path),
            payload_fp: identity::payload_fingerprint(&[
                Some(&step.title),
                step.description.as_deref(),
            ]),
            text: step.title.clone(),
            quoted: step.source_text.clone(),
            payload: ClaimPayload::Step {
                order: step.order,
                title: step.title.clone(),
                description: step.description.clone(),
            },
        }
    }

    fn fee(fee: &ExtractedFee) -> Self {
        let amount = format_amount(fee.amount);
        let variant = fee.variant.map(|v| v.as_str());
        let text = match fee.variant {
            Some(v) => format!("{}: {} {} ({})", fee.label, amount, fee.currency, v.label()),
            None => format!("{}: {} {}", fee.label, amount, fee.currency),
        };
        Self {
            claim_type: ClaimType::Fee,
            locator: Locator::heading_path(&fee.heading_path),
            payload_fp: identity::payload_fingerprint(&[
                Some(&fee.label),
                Some(&amount),
                Some(&fee.currency),
                variant,
            ]),
            text,
            quoted: fee.source_text.clone(),
            payload: ClaimPayload::Fee {
                label: fee.label.clone(),
                amount: fee.amount,
                currency: fee.currency.clone(),
                variant: variant.map(str::to_string),
            },
        }
    }

    fn faq(faq: &ExtractedFaq) -> Self {
        let answer = faq.answer.as_deref().or(faq.link.as_deref());
        let quoted = match &faq.answer {
            Some(answer) => format!("{} {}", faq.question, answer),
            None => faq.question.clone(),
        };
        Self {
            claim_type: ClaimType::Faq,
            locator: Locator::heading_path(&faq.heading_path),
            payload_fp: identity::payload_fingerprint(&[Some(&faq.question), answer]),
            text: faq.question.clone(),
            quoted,
            payload: ClaimPayload::Faq {
                question: faq.question.clone(),
                answer: faq.answer.clone(),
                link: faq.link.clone(),
            },
        }
    }

    fn document(doc: &ExtractedDocument) -> Self {
        let label = doc.text.clone().unwrap_or_else(|| doc.url.clone());
        Self {
            claim_type: ClaimType::DocumentRequirement,
            locator: Locator::heading_path(&doc.heading_path),
            payload_fp: identity::payload_fingerprint(&[Some(&doc.url), doc.text.as_deref()]),
            text: label.clone(),
            quoted: label,
            payload: ClaimPayload::Document {
                url: doc.url.clone(),
                text: doc.text.clone(),
            },
        }
    }

    fn into_claim(self, source: &ClaimSource<'_>) -> Claim {
        let fingerprint = identity::fingerprint(
            source.canonical_url,
            self.claim_type,
            &self.locator.render(),
            &self.payload_fp,
        );
        let claim_id = identity::claim_id(self.claim_type, source.service_key, &fingerprint);

        let mut tags = vec![TAG_AUTO_EXTRACTED.to_string()];
        if contains_bengali(&self.quoted) {
            tags.push(TAG_BENGALI.to_string());
        }

        Claim {
            claim_id,
            claim_type: self.claim_type,
            entity_ref: EntityRef::service(source.service_id),
            citations: vec![Citation::new(
                source.source_page_id,
                source.canonical_url,
                &self.quoted,
                self.locator,
                source.retrieved_at,
                primary_language(&self.quoted),
            )],
            text: self.text,
            structured_data: self.payload,
            status: ClaimStatus::Unverified,
            tags,
            created_at: source.retrieved_at,
            last_verified_at: None,
        }
    }
}

/// Claims for one page: steps, fees, FAQs, then documents, each in
/// extraction order, with duplicate ids dropped.
pub fn build_claims(data: &ExtractedData, source: &ClaimSource<'_>) -> Vec<Claim> {
    let drafts = data
        .steps
        .iter()
        .map(Draft::step)
        .chain(data.fee_table.iter().map(Draft::fee))
        .chain(data.faq_pairs.iter().map(Draft::faq))
        .chain(data.document_list.iter().map(Draft::document));

    let mut seen = HashSet::new();
    drafts
        .map(|d| d.into_claim(source))
        .filter(|c| seen.insert(c.claim_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor;

    const URL: &str = "https://www.epassport.gov.bd/instructions/passport-fees";

    fn source() -> ClaimSource<'static> {
        ClaimSource::new(URL, "source.abc", "svc.epassport", "epassport")
    }

    const PAGE: &str = "# Passport Fees\n\
        ## How to apply\n\
        1. Visit the portal\n\
        2. Fill the form\n\
        ### Express Service\n\
        - Fee: 6,900 BDT\n\
        ### Super Express\n\
        - Fee: 13,800 BDT\n\
        ### How long does it take?\n\
        It takes 15 working days.\n\
        [Application form](/files/form.pdf)\n";

    #[test]
    fn test_claims_in_type_order() {
        let data = extractor::extract(PAGE, URL, None);
        let claims = build_claims(&data, &source());
        let types: Vec<ClaimType> = claims.iter().map(|c| c.claim_type).collect();
        assert_eq!(
            types,
            vec![
                ClaimType::Step,
                ClaimType::Step,
                ClaimType::Fee,
                ClaimType::Fee,
                ClaimType::Faq,
                ClaimType::DocumentRequirement,
            ]
        );
        assert!(claims.iter().all(|c| c.claim_id.starts_with("claim.")));
        assert!(claims.iter().all(|c| c.tags == vec![TAG_AUTO_EXTRACTED]));
    }

    #[test]
    fn test_ids_are_stable_across_runs() {
        let data = extractor::extract(PAGE, URL, None);
        let a = build_claims(&data, &source());
        let later = source().with_retrieved_at(Utc::now() + chrono::Duration::days(3));
        let b = build_claims(&extractor::extract(PAGE, URL, None), &later);
        let ids = |claims: &[Claim]| claims.iter().map(|c| c.claim_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_ids_depend_on_url_and_heading() {
        let data = extractor::extract("## A\n- Fee: 500 BDT\n", URL, None);
        let moved = extractor::extract("## B\n- Fee: 500 BDT\n", URL, None);
        let a = build_claims(&data, &source());
        let b = build_claims(&moved, &source());
        assert_ne!(a[0].claim_id, b[0].claim_id);

        let other_url = ClaimSource::new("https://www.epassport.gov.bd/other", "source.def", "svc.epassport", "epassport");
        assert_ne!(a[0].claim_id, build_claims(&data, &other_url)[0].claim_id);
    }

    #[test]
    fn test_fee_claim_shape() {
        let data = extractor::extract("### Express Service\n- Fee: 6,900 BDT\n", URL, None);
        let claims = build_claims(&data, &source());
        let fee = &claims[0];
        assert!(fee.claim_id.starts_with("claim.fee.epassport."));
        assert_eq!(fee.text, "Fee: 6900 BDT (Express)");
        match &fee.structured_data {
            ClaimPayload::Fee { amount, variant, .. } => {
                assert_eq!(*amount, 6900.0);
                assert_eq!(variant.as_deref(), Some("express"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(fee.citations[0].locator.render(), "Express Service");
        assert_eq!(fee.citations[0].source_page_id, "source.abc");
    }

    #[test]
    fn test_bengali_tag() {
        let data = extractor::extract("১) পোর্টালে যান\n২) নিবন্ধন করুন\n", URL, None);
        let claims = build_claims(&data, &source());
        assert_eq!(claims.len(), 2);
        assert!(claims.iter().all(|c| c.tags.contains(&TAG_BENGALI.to_string())));
        assert_eq!(claims[0].citations[0].language, crate::types::page::Language::Bn);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(4025.0), "4025");
        assert_eq!(format_amount(12.5), "12.5");
    }
}
