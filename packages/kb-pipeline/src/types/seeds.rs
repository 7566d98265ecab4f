//! Seeds file: the domains a crawl starts from.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    pub label: String,
    pub domain: String,
    #[serde(default)]
    pub start_urls: Vec<String>,
    #[serde(default)]
    pub source_page_url: Option<String>,
}

impl Seed {
    /// Start URLs, falling back to the domain root.
    pub fn effective_start_urls(&self) -> Vec<String> {
        if self.start_urls.is_empty() {
            vec![format!("https://{}", self.domain)]
        } else {
            self.start_urls.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedsFile {
    #[serde(rename = "$generated_at", default)]
    pub generated_at: Option<String>,
    #[serde(rename = "$source", default)]
    pub source: Option<String>,
    #[serde(rename = "$category", default)]
    pub category: Option<String>,
    #[serde(rename = "$extraction_method", default)]
    pub extraction_method: Option<String>,
    pub seeds: Vec<Seed>,
}

impl SeedsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let seeds_err = |reason: String| PipelineError::Seeds {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| seeds_err(e.to_string()))?;
        let file: SeedsFile = serde_json::from_str(&raw).map_err(|e| seeds_err(e.to_string()))?;
        if let Some(bad) = file.seeds.iter().find(|s| s.domain.trim().is_empty()) {
            return Err(seeds_err(format!("seed '{}' has an empty domain", bad.label)));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seeds_file() {
        let raw = r#"{
            "$generated_at": "2025-01-01T00:00:00Z",
            "$source": "bangladesh.gov.bd",
            "$category": "public_services",
            "$extraction_method": "manual",
            "seeds": [
                {"label": "e-Passport", "domain": "epassport.gov.bd",
                 "start_urls": ["https://www.epassport.gov.bd/landing"],
                 "source_page_url": "https://bangladesh.gov.bd/services"},
                {"label": "NID", "domain": "nidw.gov.bd"}
            ]
        }"#;
        let file: SeedsFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.seeds.len(), 2);
        assert_eq!(file.category.as_deref(), Some("public_services"));
        assert_eq!(
            file.seeds[1].effective_start_urls(),
            vec!["https://nidw.gov.bd".to_string()]
        );
    }

    #[test]
    fn test_load_rejects_empty_domain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_seeds.json");
        std::fs::write(&path, r#"{"seeds": [{"label": "bad", "domain": " "}]}"#).unwrap();
        assert!(matches!(SeedsFile::load(&path), Err(PipelineError::Seeds { .. })));
    }
}
