//! Page type and language tagging.

use std::collections::BTreeSet;

use super::bengali::script_counts;
use crate::types::extracted::ExtractedData;
use crate::types::page::{Language, PageType};

/// Keyword hints matched against the lowercased URL and title.
const KEYWORD_TYPES: &[(PageType, &[&str])] = &[
    (PageType::Tutorial, &["tutorial", "how-to", "how_to", "guide", "instruction", "নির্দেশিকা"]),
    (PageType::Procedure, &["procedure", "process", "apply", "application", "পদ্ধতি", "আবেদন"]),
    (PageType::Faq, &["faq", "question", "প্রশ্ন"]),
    (PageType::Requirements, &["requirement", "document", "eligibility", "checklist", "প্রয়োজনীয়", "কাগজ"]),
    (PageType::Fees, &["fee", "charge", "payment", "ফি"]),
    (PageType::ProcessingTime, &["processing-time", "delivery", "duration"]),
    (PageType::Portal, &["portal", "login", "online", "পোর্টাল"]),
    (PageType::Office, &["office", "branch", "অফিস", "কার্যালয়"]),
    (PageType::Contact, &["contact", "helpline", "যোগাযোগ"]),
    (PageType::Form, &["form", "download", "ফরম"]),
];

const PROCESSING_TIME_MARKERS: &[&str] = &[
    "working days",
    "business days",
    "processing time",
    "কার্যদিবস",
    "কর্মদিবস",
];

/// Closed-set page tags from URL, title and extracted content. Never empty.
pub fn classify_page(url: &str, title: Option<&str>, markdown: &str, data: &ExtractedData) -> Vec<PageType> {
    let haystack = format!("{} {}", url, title.unwrap_or("")).to_lowercase();
    let mut types: BTreeSet<PageType> = KEYWORD_TYPES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| haystack.contains(w)))
        .map(|(t, _)| *t)
        .collect();

    if data.steps.len() >= 2 {
        types.insert(PageType::Procedure);
    }
    if !data.fee_table.is_empty() {
        types.insert(PageType::Fees);
    }
    if !data.faq_pairs.is_empty() {
        types.insert(PageType::Faq);
    }
    if !data.document_list.is_empty() {
        types.insert(PageType::Form);
    }
    let body = markdown.to_lowercase();
    if PROCESSING_TIME_MARKERS.iter().any(|m| body.contains(m)) {
        types.insert(PageType::ProcessingTime);
    }

    if types.is_empty() {
        types.insert(PageType::General);
    }
    types.into_iter().collect()
}

/// Languages whose script makes up at least a fifth of the letters. Never empty.
pub fn detect_languages(markdown: &str) -> Vec<Language> {
    let (bengali, latin) = script_counts(markdown);
    let total = bengali + latin;
    if total == 0 {
        return vec![Language::En];
    }
    let mut langs = Vec::new();
    if latin * 5 >= total {
        langs.push(Language::En);
    }
    if bengali * 5 >= total {
        langs.push(Language::Bn);
    }
    langs
}

/// Dominant language, used for citations.
pub fn primary_language(text: &str) -> Language {
    let (bengali, latin) = script_counts(text);
    if bengali > latin {
        Language::Bn
    } else {
        Language::En
    }
}
