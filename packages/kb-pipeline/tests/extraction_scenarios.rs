//! Extraction scenarios over the public extractor API.
//!
//! Literal page fragments from the portals, plus property tests that the
//! extractor and claim ids are deterministic over arbitrary line mixes.

use kb_pipeline::extractor::extract;
use kb_pipeline::pipeline::{build_claims, ClaimSource};
use kb_pipeline::FeeVariant;
use proptest::prelude::*;

const URL: &str = "https://www.epassport.gov.bd/instructions/application-process";

fn page(lines: &[&str]) -> String {
    lines.join("\n")
}

#[test]
fn test_english_numbered_steps() {
    let md = page(&[
        "1. Visit the portal",
        "2. Click on Register",
        "3. Fill the form",
        "4. Submit application",
    ]);
    let data = extract(&md, URL, None);

    let steps: Vec<(u32, &str)> = data.steps.iter().map(|s| (s.order, s.title.as_str())).collect();
    assert_eq!(
        steps,
        vec![
            (1, "Visit the portal"),
            (2, "Click on Register"),
            (3, "Fill the form"),
            (4, "Submit application"),
        ]
    );
}

#[test]
fn test_bengali_numbered_steps() {
    let md = page(&["১) পোর্টালে যান", "২) নিবন্ধন করুন", "৩) ফরম পূরণ করুন"]);
    let data = extract(&md, URL, None);

    let orders: Vec<u32> = data.steps.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(data.steps[0].title, "পোর্টালে যান");
}

#[test]
fn test_fee_variants_follow_headings() {
    let md = page(&[
        "### Express Service",
        "- Fee: 6,900 BDT",
        "### Super Express",
        "- Fee: 13,800 BDT",
    ]);
    let data = extract(&md, URL, None);

    assert_eq!(data.fee_table.len(), 2);
    assert_eq!(data.fee_table[0].variant, Some(FeeVariant::Express));
    assert_eq!(data.fee_table[0].amount, 6900.0);
    assert_eq!(data.fee_table[1].variant, Some(FeeVariant::SuperExpress));
    assert_eq!(data.fee_table[1].amount, 13800.0);
    assert!(data.fee_table.iter().all(|f| f.currency == "BDT"));
    assert_eq!(data.fee_table[0].variant.map(|v| v.as_str()), Some("express"));
    assert_eq!(data.fee_table[1].variant.map(|v| v.as_str()), Some("super_express"));
}

#[test]
fn test_bengali_numeral_fee() {
    let md = page(&["### ফি", "- ৪৮ পৃষ্ঠা: ১৩,৮০০ টাকা"]);
    let data = extract(&md, URL, None);

    assert_eq!(data.fee_table.len(), 1);
    assert_eq!(data.fee_table[0].amount, 13800.0);
    assert_eq!(data.fee_table[0].currency, "BDT");
}

#[test]
fn test_faq_from_question_heading() {
    let md = page(&["### How long does it take?", "It takes 15 working days."]);
    let data = extract(&md, URL, None);

    assert_eq!(data.faq_pairs.len(), 1);
    assert_eq!(data.faq_pairs[0].question, "How long does it take?");
    assert_eq!(
        data.faq_pairs[0].answer.as_deref(),
        Some("It takes 15 working days.")
    );
}

#[test]
fn test_mixed_page_claims_are_stable() {
    let md = page(&[
        "# Passport Fees",
        "## How to apply",
        "1. Visit the portal",
        "2. Submit application",
        "### Regular delivery",
        "- 48 pages, 5 years validity: BDT 4,025",
        "### How long does it take?",
        "It takes 15 working days.",
    ]);
    let source = ClaimSource::new(URL, "source.test", "svc.epassport", "epassport");

    let first = build_claims(&extract(&md, URL, None), &source);
    let second = build_claims(&extract(&md, URL, None), &source);
    let ids = |claims: &[kb_pipeline::Claim]| -> Vec<String> {
        claims.iter().map(|c| c.claim_id.clone()).collect()
    };

    assert!(first.len() >= 4);
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn test_sibling_section_does_not_become_parent() {
    let data = extract(&page(&["## Overview", "Intro text", "## Fees", "- Fee: 500 BDT"]), URL, None);

    assert_eq!(data.fee_table.len(), 1);
    assert_eq!(data.fee_table[0].heading_path, vec!["Fees"]);
}

#[test]
fn test_fee_claim_id_survives_unrelated_section() {
    let source = ClaimSource::new(URL, "source.test", "svc.epassport", "epassport");
    let fee_ids = |md: &str| -> Vec<String> {
        build_claims(&extract(md, URL, None), &source)
            .into_iter()
            .map(|c| c.claim_id)
            .filter(|id| id.starts_with("claim.fee."))
            .collect()
    };

    let before = fee_ids(&page(&["## Fees", "- Fee: 500 BDT"]));
    let after = fee_ids(&page(&["## Intro", "Welcome to the portal.", "## Fees", "- Fee: 500 BDT"]));

    assert_eq!(before.len(), 1);
    assert_eq!(before, after);
}

#[test]
fn test_variant_does_not_leak_into_sibling_section() {
    let data = extract(
        &page(&["## Express Service", "- Fee: 6,900 BDT", "## Other charges", "- Fee: 500 BDT"]),
        URL,
        None,
    );

    assert_eq!(data.fee_table.len(), 2);
    assert_eq!(data.fee_table[0].variant, Some(FeeVariant::Express));
    assert_eq!(data.fee_table[1].variant, None);
}

const VOCABULARY: &[&str] = &[
    "# e-Passport",
    "## How to apply",
    "### Express Service",
    "### Super Express",
    "### Regular delivery",
    "### ফি",
    "### How long does it take?",
    "1. Visit the portal",
    "2. Fill the form",
    "3. Submit application",
    "১) পোর্টালে যান",
    "২) নিবন্ধন করুন",
    "- Fee: 6,900 BDT",
    "- Fee: 13,800 BDT",
    "- Regular delivery: TK 4,025",
    "- ৪৮ পৃষ্ঠা: ১৩,৮০০ টাকা",
    "Fee ৳5,000",
    "It takes 15 working days.",
    "[Application form](/files/form.pdf)",
    "[Checklist](https://www.epassport.gov.bd/docs/checklist.docx)",
    "",
    "Plain paragraph text.",
];

fn markdown_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCABULARY), 0..40).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn prop_extraction_is_deterministic(md in markdown_strategy()) {
        prop_assert_eq!(extract(&md, URL, None), extract(&md, URL, None));
    }

    #[test]
    fn prop_claim_ids_unique_and_stable(md in markdown_strategy()) {
        let source = ClaimSource::new(URL, "source.test", "svc.epassport", "epassport");
        let first: Vec<String> = build_claims(&extract(&md, URL, None), &source)
            .into_iter()
            .map(|c| c.claim_id)
            .collect();
        let second: Vec<String> = build_claims(&extract(&md, URL, None), &source)
            .into_iter()
            .map(|c| c.claim_id)
            .collect();

        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), first.len());
        prop_assert!(first.iter().all(|id| id.starts_with("claim.") && !id.contains("auto_")));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_extraction_never_panics(md in "\\PC{0,400}") {
        let data = extract(&md, URL, None);
        prop_assert!(data.stats.lines >= data.stats.steps);
    }
}
