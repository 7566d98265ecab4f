//! Deterministic bilingual extractor.
//!
//! Converts page markdown into steps, fees, FAQs and document links using
//! closed regex rule sets for English and Bengali. The document is walked
//! once to attach a heading path and a rolling fee variant to every line;
//! each sub-extractor then reads that context.
//!
//! For byte-identical `(markdown, url, html)` inputs the output is
//! byte-identical, including order.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kb_pipeline::extractor;
//!
//! let data = extractor::extract(markdown, "https://www.epassport.gov.bd/instructions/passport-fees", None);
//! for fee in &data.fee_table {
//!     println!("{} {} {:?}", fee.label, fee.amount, fee.variant);
//! }
//! ```

pub mod bengali;
pub mod classify;
pub mod documents;
pub mod faqs;
pub mod fees;
pub mod headings;
pub mod steps;

use regex::Regex;
use std::sync::LazyLock;

use crate::types::extracted::{ExtractedData, ExtractionStats};

pub use classify::{classify_page, detect_languages, primary_language};
pub use documents::{document_extension, is_binary_url, is_document_url};

pub(crate) static RE_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-•–*+]\s+(.+)$").unwrap());
pub(crate) static RE_MD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!?\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).unwrap()
});
static RE_MD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static RE_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*|__|`").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip images, link syntax (keeping link text) and emphasis; collapse whitespace.
pub(crate) fn clean_inline(text: &str) -> String {
    let no_images = RE_MD_IMAGE.replace_all(text, "");
    let no_links = RE_MD_LINK.replace_all(&no_images, "$1");
    let no_emphasis = RE_EMPHASIS.replace_all(&no_links, "");
    RE_SPACES.replace_all(no_emphasis.trim(), " ").into_owned()
}

/// Keep at most `max` characters.
pub(crate) fn clamp_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim_end().to_string()
}

/// Run every extractor over a page.
pub fn extract(markdown: &str, url: &str, html: Option<&str>) -> ExtractedData {
    let folded = bengali::fold_nukta(markdown);
    let (lines, headings) = headings::scan(&folded);

    let steps = steps::extract_steps(&lines);
    let fee_table = fees::extract_fees(&lines);
    let faq_pairs = faqs::extract_faqs(&lines, url);
    let document_list = documents::extract_documents(&lines, url, html);

    let (bengali_chars, latin_chars) = bengali::script_counts(&folded);
    let stats = ExtractionStats {
        lines: lines.len(),
        headings: headings.len(),
        steps: steps.len(),
        fees: fee_table.len(),
        faqs: faq_pairs.len(),
        documents: document_list.len(),
        bengali_chars,
        latin_chars,
    };

    tracing::debug!(
        url = %url,
        steps = stats.steps,
        fees = stats.fees,
        faqs = stats.faqs,
        documents = stats.documents,
        "Extracted page"
    );

    ExtractedData {
        steps,
        fee_table,
        faq_pairs,
        document_list,
        headings,
        stats,
    }
}
