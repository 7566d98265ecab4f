//! Claims - atomic, citable facts - and their citations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::identity::ClaimType;
use crate::types::page::Language;

/// Maximum length of a citation's quoted text, in characters.
pub const MAX_QUOTED_TEXT: usize = 300;

/// Verification state of a claim. Display-only: never part of the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Verified,
    #[default]
    Unverified,
    Stale,
    Deprecated,
    Contradicted,
}

/// Where inside the source a cited span lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Locator {
    HeadingPath { path: Vec<String> },
    CssSelector { selector: String },
    Xpath { xpath: String },
    UrlFragment { fragment: String },
    PdfPage { page: u32 },
}

impl Locator {
    pub fn heading_path(path: &[String]) -> Self {
        Self::HeadingPath {
            path: path.to_vec(),
        }
    }

    /// Canonical string form; heading paths render as `A > B > C`.
    pub fn render(&self) -> String {
        match self {
            Self::HeadingPath { path } => path.join(" > "),
            Self::CssSelector { selector } => selector.clone(),
            Self::Xpath { xpath } => xpath.clone(),
            Self::UrlFragment { fragment } => format!("#{}", fragment.trim_start_matches('#')),
            Self::PdfPage { page } => format!("page={}", page),
        }
    }
}

/// Provenance record linking a claim to a source page and quoted span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source_page_id: String,
    pub canonical_url: String,
    pub quoted_text: String,
    pub locator: Locator,
    pub retrieved_at: DateTime<Utc>,
    pub language: Language,
}

impl Citation {
    /// Build a citation, clamping the quote to `MAX_QUOTED_TEXT` characters.
    pub fn new(
        source_page_id: impl Into<String>,
        canonical_url: impl Into<String>,
        quoted_text: &str,
        locator: Locator,
        retrieved_at: DateTime<Utc>,
        language: Language,
    ) -> Self {
        Self {
            source_page_id: source_page_id.into(),
            canonical_url: canonical_url.into(),
            quoted_text: quoted_text.trim().chars().take(MAX_QUOTED_TEXT).collect(),
            locator,
            retrieved_at,
            language,
        }
    }
}

/// The entity a claim is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn service(service_id: impl Into<String>) -> Self {
        Self {
            entity_type: "service".to_string(),
            id: service_id.into(),
        }
    }
}

/// Type-specific claim payload.
///
/// Untagged: each variant has a distinct required field (`title`,
/// `label`, `question`, `url`) so round-tripping is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimPayload {
    Step {
        order: u32,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Fee {
        label: String,
        amount: f64,
        currency: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
    },
    Faq {
        question: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link: Option<String>,
    },
    Document {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// One atomic, citable fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub claim_type: ClaimType,
    pub entity_ref: EntityRef,
    pub text: String,
    pub structured_data: ClaimPayload,
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub status: ClaimStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
}

impl Claim {
    /// Service id this claim is about.
    pub fn service_id(&self) -> &str {
        &self.entity_ref.id
    }

    /// Source pages cited by this claim.
    pub fn cited_pages(&self) -> impl Iterator<Item = &str> {
        self.citations.iter().map(|c| c.source_page_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_render() {
        let loc = Locator::heading_path(&["A".to_string(), "B".to_string(), "C".to_string()]);
        assert_eq!(loc.render(), "A > B > C");
        assert_eq!(Locator::heading_path(&[]).render(), "");
        assert_eq!(Locator::PdfPage { page: 3 }.render(), "page=3");
        assert_eq!(
            Locator::UrlFragment {
                fragment: "fees".into()
            }
            .render(),
            "#fees"
        );
    }

    #[test]
    fn test_locator_serde_shape() {
        let loc = Locator::heading_path(&["Fees".to_string()]);
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json, serde_json::json!({"type": "heading_path", "path": ["Fees"]}));
    }

    #[test]
    fn test_payload_untagged_roundtrip_picks_right_variant() {
        let fee = ClaimPayload::Fee {
            label: "Express".into(),
            amount: 6900.0,
            currency: "BDT".into(),
            variant: Some("express".into()),
        };
        let json = serde_json::to_string(&fee).unwrap();
        let back: ClaimPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fee);

        let doc: ClaimPayload =
            serde_json::from_str(r#"{"url": "https://x.gov.bd/form.pdf"}"#).unwrap();
        assert!(matches!(doc, ClaimPayload::Document { .. }));
    }

    #[test]
    fn test_citation_quote_is_clamped() {
        let long = "ক".repeat(400);
        let c = Citation::new(
            "source.x",
            "https://x.gov.bd",
            &long,
            Locator::heading_path(&[]),
            Utc::now(),
            Language::Bn,
        );
        assert_eq!(c.quoted_text.chars().count(), MAX_QUOTED_TEXT);
    }

    #[test]
    fn test_status_default() {
        assert_eq!(ClaimStatus::default(), ClaimStatus::Unverified);
    }
}
