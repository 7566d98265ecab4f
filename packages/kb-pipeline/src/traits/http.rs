//! Plain HTTP capability for robots.txt, sitemaps and binary documents.

use async_trait::async_trait;

use crate::error::FetchResult;

/// Unrendered HTTP GET.
///
/// `Ok(None)` means the server answered with a non-success status; the
/// caller treats that as "absent" rather than as a failure.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get_text(&self, url: &str) -> FetchResult<Option<String>>;

    /// Download a body, failing with `FileTooLarge` once it exceeds `max_size` bytes.
    async fn get_bytes(&self, url: &str, max_size: u64) -> FetchResult<Option<Vec<u8>>>;
}

/// Text extraction from a downloaded binary document (PDF, DOCX, XLSX, ...).
pub trait DocumentTextExtractor: Send + Sync {
    /// Whether this extractor handles the given lowercase file extension.
    fn supports(&self, extension: &str) -> bool;

    /// Markdown-ish text of the document, or `None` if nothing usable was found.
    fn extract(&self, bytes: &[u8]) -> Option<String>;
}
