//! Per-URL scrape overrides.
//!
//! An override is a row of data: option replacements merged over the
//! caller's options plus an optional markdown postprocessor. Pages that
//! need a render wait or text scrubbing get a row here; the extractor
//! never learns about them.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::traits::fetcher::ScrapeOptions;

/// Option keys an override may replace.
pub const OVERRIDABLE_KEYS: &[&str] = &[
    "formats",
    "onlyMainContent",
    "removeBase64Images",
    "waitFor",
    "timeout",
    "includeTags",
    "excludeTags",
    "headers",
];

/// Client-rendered fee table; `TK` must read `BDT` for the fee patterns.
pub const EPASSPORT_FEES_URL: &str = "https://www.epassport.gov.bd/instructions/passport-fees";

/// One regex replacement applied to fetched markdown.
#[derive(Debug, Clone)]
pub struct Postprocess {
    regex: Regex,
    replacement: String,
}

impl Postprocess {
    pub fn new(pattern: &str, replacement: impl Into<String>, case_insensitive: bool) -> std::result::Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            regex,
            replacement: replacement.into(),
        })
    }

    pub fn apply(&self, markdown: &str) -> String {
        self.regex
            .replace_all(markdown, self.replacement.as_str())
            .into_owned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeOverride {
    options: serde_json::Map<String, serde_json::Value>,
    postprocess: Vec<Postprocess>,
}

impl ScrapeOverride {
    /// Build from a raw option patch; keys outside the whitelist are dropped.
    pub fn new(options: serde_json::Map<String, serde_json::Value>) -> Self {
        let options = options
            .into_iter()
            .filter(|(key, _)| {
                let allowed = OVERRIDABLE_KEYS.contains(&key.as_str());
                if !allowed {
                    tracing::warn!(key = %key, "Ignoring non-overridable scrape option");
                }
                allowed
            })
            .collect();
        Self {
            options,
            postprocess: Vec::new(),
        }
    }

    pub fn with_postprocess(mut self, step: Postprocess) -> Self {
        self.postprocess.push(step);
        self
    }

    /// Caller options with this override's keys replaced.
    pub fn apply_options(&self, base: &ScrapeOptions) -> ScrapeOptions {
        if self.options.is_empty() {
            return base.clone();
        }
        let mut value = match serde_json::to_value(base) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return base.clone(),
        };
        for (key, patch) in &self.options {
            value.insert(key.clone(), patch.clone());
        }
        match serde_json::from_value(serde_json::Value::Object(value)) {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(error = %e, "Scrape override produced invalid options, using caller options");
                base.clone()
            }
        }
    }

    pub fn postprocess(&self, markdown: &str) -> String {
        self.postprocess
            .iter()
            .fold(markdown.to_string(), |md, step| step.apply(&md))
    }

    pub fn has_postprocess(&self) -> bool {
        !self.postprocess.is_empty()
    }
}

#[derive(Deserialize)]
struct OverrideFileEntry {
    url: String,
    #[serde(default)]
    options: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    postprocess: Vec<PostprocessFileEntry>,
}

#[derive(Deserialize)]
struct PostprocessFileEntry {
    pattern: String,
    replacement: String,
    #[serde(default)]
    case_insensitive: bool,
}

/// Exact-match table keyed by normalized URL.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, ScrapeOverride>,
}

/// Lowercase and strip trailing slashes.
pub fn normalize_key(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in rows.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        let mut options = serde_json::Map::new();
        options.insert("onlyMainContent".into(), false.into());
        options.insert("formats".into(), serde_json::json!(["markdown", "rawHtml"]));
        options.insert("waitFor".into(), 5000.into());

        // Compile-time constant pattern.
        if let Ok(tk_to_bdt) = Postprocess::new(r"\bTK\b", "BDT", true) {
            table.insert(
                EPASSPORT_FEES_URL,
                ScrapeOverride::new(options).with_postprocess(tk_to_bdt),
            );
        }
        table
    }

    /// Built-in rows extended by `path` when the file exists.
    pub fn builtin_with_file(path: &Path) -> Result<Self> {
        let mut table = Self::builtin();
        if path.is_file() {
            table.extend_from_file(path)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, url: &str, entry: ScrapeOverride) {
        self.entries.insert(normalize_key(url), entry);
    }

    pub fn get(&self, url: &str) -> Option<&ScrapeOverride> {
        self.entries.get(&normalize_key(url))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load `[{url, options, postprocess: [{pattern, replacement, case_insensitive}]}]`.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let err = |reason: String| PipelineError::Overrides {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let rows: Vec<OverrideFileEntry> =
            serde_json::from_str(&raw).map_err(|e| err(e.to_string()))?;

        for row in rows {
            let mut entry = ScrapeOverride::new(row.options);
            for step in row.postprocess {
                let compiled = Postprocess::new(&step.pattern, step.replacement, step.case_insensitive)
                    .map_err(|e| err(format!("bad pattern for {}: {}", row.url, e)))?;
                entry = entry.with_postprocess(compiled);
            }
            self.insert(&row.url, entry);
        }
        tracing::info!(path = %path.display(), entries = self.len(), "Loaded scrape overrides");
        Ok(())
    }
}
