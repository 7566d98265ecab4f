//! Downloadable document links.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use super::headings::LineContext;
use super::{clean_inline, RE_MD_LINK};
use crate::types::extracted::ExtractedDocument;

/// Extensions treated as binary documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx"];

static RE_BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s)<>\]"'`]+"#).unwrap());
static RE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).unwrap());
static RE_DOWNLOAD_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[?&](?:id|file|doc|attachment)=").unwrap());

/// Lowercase document extension of a URL's path, if it has a known one.
pub fn document_extension(url: &str) -> Option<&'static str> {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS.iter().find(|e| **e == ext).copied()
}

/// Known binary document by extension.
pub fn is_binary_url(url: &str) -> bool {
    document_extension(url).is_some()
}

/// Document by extension or by a download-style query parameter.
pub fn is_document_url(url: &str) -> bool {
    is_binary_url(url) || RE_DOWNLOAD_QUERY.is_match(url)
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }
    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

pub fn extract_documents(
    lines: &[LineContext],
    page_url: &str,
    html: Option<&str>,
) -> Vec<ExtractedDocument> {
    let base = Url::parse(page_url).ok();
    let mut found: IndexMap<String, ExtractedDocument> = IndexMap::new();

    let mut record = |url: String, text: Option<String>, heading_path: &[String]| {
        if !is_document_url(&url) {
            return;
        }
        found.entry(url.clone()).or_insert_with(|| ExtractedDocument {
            url,
            text: text.filter(|t| !t.is_empty()),
            heading_path: heading_path.to_vec(),
        });
    };

    for ctx in lines {
        if ctx.is_blank() {
            continue;
        }
        for caps in RE_MD_LINK.captures_iter(&ctx.text) {
            if let Some(url) = resolve(base.as_ref(), &caps[2]) {
                record(url, Some(clean_inline(&caps[1])), &ctx.heading_path);
            }
        }
        for m in RE_BARE_URL.find_iter(&ctx.text) {
            let raw = m.as_str().trim_end_matches(['.', ',', ';', ':']);
            if let Some(url) = resolve(base.as_ref(), raw) {
                record(url, None, &ctx.heading_path);
            }
        }
    }

    if let Some(html) = html {
        for caps in RE_HREF.captures_iter(html) {
            if let Some(url) = resolve(base.as_ref(), &caps[1]) {
                record(url, None, &[]);
            }
        }
    }

    found.into_values().collect()
}
