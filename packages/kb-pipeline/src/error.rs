//! Typed errors for the KB pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! distinguish retryable transport failures from classified ones.

use thiserror::Error;

/// Errors raised by fetch capabilities and the fetch adapter.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch backend cannot serve requests at all (missing key, quota, auth)
    #[error("fetch capability unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the page could not be scraped
    #[error("scrape failed for {url}: {reason}")]
    ScrapeFailed { url: String, reason: String },

    /// Direct HTTP download of a binary document is disabled
    #[error("direct HTTP document download not allowed: {url}")]
    HttpDownloadNotAllowed { url: String },

    /// Binary download exceeded the configured size limit
    #[error("file too large: {url} exceeds {limit} bytes")]
    FileTooLarge { url: String, limit: u64 },

    /// Request timed out
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Unclassified transport failure
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FetchError {
    /// Build a `ScrapeFailed` error.
    pub fn scrape_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScrapeFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Build a `Transport` error from a message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into().into())
    }

    /// Only unclassified transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }
}

/// Errors raised while loading, mutating or persisting the KB and snapshots.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The KB file holds two entities with the same id
    #[error("duplicate {kind} id in KB: {id}")]
    DuplicateId { kind: &'static str, id: String },

    /// An in-memory index no longer resolves to the entity it names
    #[error("{kind} index corrupt at {id}")]
    IndexCorrupt { kind: &'static str, id: String },
}

impl KbError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Category of a published-output validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Missing or mistyped keys required by the published schema
    Structural,
    /// Internal identifiers leaked into reader-facing output
    Contract,
    /// Well-formed but meaningless content (gaps in numbering, bad dates)
    Semantic,
}

/// One validation finding, located by a JSON-pointer-like path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.path, self.message)
    }
}

/// Published guides failed one or more checks.
#[derive(Debug, Error)]
#[error("validation failed with {} issue(s)", issues.len())]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

/// Top-level pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Strict mode requires a fetch capability and none was configured
    #[error("fetch capability required but unavailable: {0}")]
    FetchCapabilityMissing(String),

    #[error("KB error: {0}")]
    Kb(#[from] KbError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid seeds file {path}: {reason}")]
    Seeds { path: String, reason: String },

    #[error("invalid scrape overrides {path}: {reason}")]
    Overrides { path: String, reason: String },

    /// Claims cite source pages the KB does not hold
    #[error("{0} citation(s) reference missing source pages")]
    DanglingReferences(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for KB and snapshot operations.
pub type KbResult<T> = std::result::Result<T, KbError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::transport("connection reset").is_retryable());
        assert!(FetchError::Timeout {
            url: "https://example.gov.bd".into()
        }
        .is_retryable());
        assert!(!FetchError::Unavailable("no key".into()).is_retryable());
        assert!(!FetchError::scrape_failed("https://example.gov.bd", "empty content").is_retryable());
        assert!(!FetchError::HttpDownloadNotAllowed {
            url: "https://example.gov.bd/a.pdf".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_scrape_failed_message() {
        let err = FetchError::scrape_failed("https://x.gov.bd/a", "empty content");
        assert_eq!(err.to_string(), "scrape failed for https://x.gov.bd/a: empty content");
    }
}
