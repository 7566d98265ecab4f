//! Extractor output types.

use serde::{Deserialize, Serialize};

/// Delivery tier attached to a fee line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeVariant {
    Regular,
    Express,
    SuperExpress,
    Emergency,
}

impl FeeVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Express => "express",
            Self::SuperExpress => "super_express",
            Self::Emergency => "emergency",
        }
    }

    /// Human label used for guide variant groups.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::Express => "Express",
            Self::SuperExpress => "Super Express",
            Self::Emergency => "Emergency",
        }
    }
}

impl std::fmt::Display for FeeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A markdown heading seen during the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// Zero-based line index
    pub line: usize,
}

/// A procedural step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedStep {
    /// Dense 1-based position after renumbering
    pub order: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub heading_path: Vec<String>,
    pub line: usize,
    pub source_text: String,
}

/// A fee line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFee {
    pub label: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<FeeVariant>,
    pub heading_path: Vec<String>,
    pub line: usize,
    pub source_text: String,
}

/// A question with an inline answer or a link to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFaq {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub heading_path: Vec<String>,
    pub line: usize,
}

/// A downloadable document link, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Empty for links found only in the HTML payload
    pub heading_path: Vec<String>,
}

/// Counters over a single extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub lines: usize,
    pub headings: usize,
    pub steps: usize,
    pub fees: usize,
    pub faqs: usize,
    pub documents: usize,
    pub bengali_chars: usize,
    pub latin_chars: usize,
}

/// Structured output of one extractor run over a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub steps: Vec<ExtractedStep>,
    pub fee_table: Vec<ExtractedFee>,
    pub faq_pairs: Vec<ExtractedFaq>,
    pub document_list: Vec<ExtractedDocument>,
    pub headings: Vec<Heading>,
    pub stats: ExtractionStats,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
            && self.fee_table.is_empty()
            && self.faq_pairs.is_empty()
            && self.document_list.is_empty()
    }

    /// The first level-1 heading, else the first heading of any level.
    pub fn title(&self) -> Option<&str> {
        self.headings
            .iter()
            .find(|h| h.level == 1)
            .or_else(|| self.headings.first())
            .map(|h| h.text.as_str())
    }
}
