//! Source pages - one record per canonical URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity;

/// Content language tag derived from script usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Bn,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Bn => "bn",
        }
    }
}

/// Closed set of page tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Tutorial,
    Procedure,
    Faq,
    Requirements,
    Fees,
    ProcessingTime,
    Portal,
    Office,
    Contact,
    Form,
    General,
}

/// One entry per observed content change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageChange {
    pub detected_at: DateTime<Utc>,
    pub hash_before: String,
    pub hash_after: String,
}

/// The deduplicated record for a canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    pub source_page_id: String,
    pub canonical_url: String,
    pub domain: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_type: Vec<PageType>,
    #[serde(default)]
    pub language: Vec<Language>,

    /// SHA-256 of the normalized markdown body
    pub content_hash: String,

    /// Hash held before the most recent change, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,

    /// Relative path of the snapshot directory, e.g. `snapshots/<id>/<date>`
    #[serde(default)]
    pub snapshot_ref: Option<String>,

    pub first_seen_at: DateTime<Utc>,
    pub last_crawled_at: DateTime<Utc>,

    /// Append-only
    #[serde(default)]
    pub change_log: Vec<PageChange>,
}

impl SourcePage {
    /// Create a page record for a canonical URL and its normalized body hash.
    pub fn new(canonical_url: impl Into<String>, content_hash: impl Into<String>) -> Self {
        let canonical_url = canonical_url.into();
        let now = Utc::now();
        Self {
            source_page_id: identity::source_page_id(&canonical_url),
            domain: identity::domain_of(&canonical_url).unwrap_or_default(),
            canonical_url,
            title: None,
            page_type: Vec::new(),
            language: Vec::new(),
            content_hash: content_hash.into(),
            previous_hash: None,
            snapshot_ref: None,
            first_seen_at: now,
            last_crawled_at: now,
            change_log: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snapshot_ref(mut self, snapshot_ref: impl Into<String>) -> Self {
        self.snapshot_ref = Some(snapshot_ref.into());
        self
    }

    pub fn with_page_types(mut self, page_type: Vec<PageType>) -> Self {
        self.page_type = page_type;
        self
    }

    pub fn with_languages(mut self, language: Vec<Language>) -> Self {
        self.language = language;
        self
    }

    pub fn with_crawled_at(mut self, at: DateTime<Utc>) -> Self {
        self.first_seen_at = at;
        self.last_crawled_at = at;
        self
    }

    /// Check if content has changed by comparing hashes.
    pub fn content_changed(&self, new_hash: &str) -> bool {
        self.content_hash != new_hash
    }
}
