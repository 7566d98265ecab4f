//! Sitemap discovery.
//!
//! Sources are the robots.txt `Sitemap:` entries plus the two
//! conventional paths. A sitemap index is followed for its first
//! [`MAX_INDEX_CHILDREN`] children, one level deep. Every failure is
//! non-fatal.

use indexmap::IndexSet;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::robots::RobotsTxt;
use crate::fetchers::FetchAdapter;

pub const MAX_INDEX_CHILDREN: usize = 5;

static RE_LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?\s*(.*?)\s*(?:\]\]>)?\s*</loc>").unwrap());

static RE_INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<sitemapindex[\s>]").unwrap());

/// `<loc>` values in document order, entities decoded.
pub fn parse_locs(xml: &str) -> Vec<String> {
    RE_LOC
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .replace("&amp;", "&")
                .replace("&apos;", "'")
                .replace("&quot;", "\"")
                .replace("&lt;", "<")
                .replace("&gt;", ">")
        })
        .filter(|u| !u.is_empty())
        .collect()
}

pub fn is_sitemap_index(xml: &str) -> bool {
    RE_INDEX.is_match(xml)
}

/// Candidate sitemap URLs for an origin.
pub fn sitemap_sources(origin: &str, robots: &RobotsTxt) -> Vec<String> {
    let origin = origin.trim_end_matches('/');
    let mut sources: IndexSet<String> = robots.sitemaps().iter().cloned().collect();
    sources.insert(format!("{}/sitemap.xml", origin));
    sources.insert(format!("{}/sitemap_index.xml", origin));
    sources.into_iter().collect()
}

async fn fetch_xml(adapter: &FetchAdapter, url: &str) -> Option<String> {
    match adapter.get_text(url).await {
        Ok(Some(xml)) => Some(xml),
        Ok(None) => {
            debug!(url = %url, "No sitemap");
            None
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Sitemap fetch failed");
            None
        }
    }
}

/// Page URLs from every sitemap source, deduplicated in discovery order.
pub async fn collect_sitemap_urls(adapter: &FetchAdapter, origin: &str, robots: &RobotsTxt) -> Vec<String> {
    let mut visited: IndexSet<String> = IndexSet::new();
    let mut urls: IndexSet<String> = IndexSet::new();

    for source in sitemap_sources(origin, robots) {
        if !visited.insert(source.clone()) {
            continue;
        }
        let Some(xml) = fetch_xml(adapter, &source).await else {
            continue;
        };

        if !is_sitemap_index(&xml) {
            urls.extend(parse_locs(&xml));
            continue;
        }

        let children = parse_locs(&xml);
        debug!(url = %source, children = children.len(), "Sitemap index");
        for child in children.into_iter().take(MAX_INDEX_CHILDREN) {
            if !visited.insert(child.clone()) {
                continue;
            }
            if let Some(child_xml) = fetch_xml(adapter, &child).await {
                if !is_sitemap_index(&child_xml) {
                    urls.extend(parse_locs(&child_xml));
                }
            }
        }
    }

    debug!(origin = %origin, urls = urls.len(), "Sitemap URLs collected");
    urls.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHttp;
    use std::sync::Arc;

    const ORIGIN: &str = "https://www.epassport.gov.bd";

    fn urlset(urls: &[&str]) -> String {
        let body: String = urls.iter().map(|u| format!("<url><loc>{}</loc></url>", u)).collect();
        format!(r#"<?xml version="1.0"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#, body)
    }

    #[test]
    fn test_parse_locs() {
        let xml = "<urlset><url><loc> https://a.gov.bd/x?a=1&amp;b=2 </loc></url>\
                   <url><loc><![CDATA[https://a.gov.bd/y]]></loc></url></urlset>";
        assert_eq!(
            parse_locs(xml),
            vec!["https://a.gov.bd/x?a=1&b=2", "https://a.gov.bd/y"]
        );
        assert!(!is_sitemap_index(xml));
        assert!(is_sitemap_index("<sitemapindex xmlns=\"x\"></sitemapindex>"));
    }

    #[test]
    fn test_sources_include_robots_entries() {
        let robots = RobotsTxt::parse("Sitemap: https://www.epassport.gov.bd/sitemap.xml\nSitemap: https://www.epassport.gov.bd/pages.xml");
        assert_eq!(
            sitemap_sources(ORIGIN, &robots),
            vec![
                "https://www.epassport.gov.bd/sitemap.xml",
                "https://www.epassport.gov.bd/pages.xml",
                "https://www.epassport.gov.bd/sitemap_index.xml",
            ]
        );
    }

    #[tokio::test]
    async fn test_index_expansion_stops_after_five_children() {
        let children: Vec<String> = (0..8).map(|i| format!("{}/sitemap-{}.xml", ORIGIN, i)).collect();
        let index_body: String = children
            .iter()
            .map(|c| format!("<sitemap><loc>{}</loc></sitemap>", c))
            .collect();

        let mut http = MockHttp::new().with_text(
            &format!("{}/sitemap_index.xml", ORIGIN),
            &format!("<sitemapindex>{}</sitemapindex>", index_body),
        );
        for (i, child) in children.iter().enumerate() {
            http = http.with_text(child, &urlset(&[&format!("{}/page-{}", ORIGIN, i)]));
        }

        let adapter = FetchAdapter::new(None).with_http(Arc::new(http.clone()));
        let urls = collect_sitemap_urls(&adapter, ORIGIN, &RobotsTxt::default()).await;

        assert_eq!(urls.len(), MAX_INDEX_CHILDREN);
        assert_eq!(urls[0], format!("{}/page-0", ORIGIN));
        assert!(!http.requested(&children[5]));
    }

    #[tokio::test]
    async fn test_missing_sitemaps_yield_nothing() {
        let adapter = FetchAdapter::new(None).with_http(Arc::new(MockHttp::new()));
        assert!(collect_sitemap_urls(&adapter, ORIGIN, &RobotsTxt::default())
            .await
            .is_empty());
    }
}
