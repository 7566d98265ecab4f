//! Identity and fingerprinting.
//!
//! Every identifier in the KB is derived from content, never from a
//! counter or a clock, so re-running the pipeline over the same pages
//! reproduces the same ids:
//!
//! - `source.<sha1(canonical_url)>` for source pages
//! - `claim.<type>.<service_key>.<first16(sha1(fingerprint))>` for claims
//! - `svc.<service_key>` / `agency.<key>` from the fixed domain tables

use sha1::Sha1;
use sha2::{Digest, Sha256};
use url::Url;

/// SHA-1 of `text` as lowercase hex.
pub fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Trim, collapse every whitespace run to one space, lowercase.
pub fn normalize_for_fingerprint(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a markdown body before it is hashed or stored.
///
/// CRLF becomes LF, trailing whitespace is stripped from every line,
/// leading/trailing blank lines are dropped and a single final newline
/// is kept.
pub fn normalize_markdown(markdown: &str) -> String {
    let unified = markdown.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();

    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());

    match (start, end) {
        (Some(s), Some(e)) => {
            let mut body = lines[s..=e].join("\n");
            body.push('\n');
            body
        }
        _ => String::new(),
    }
}

/// SHA-256 of the normalized markdown body.
pub fn content_hash(markdown: &str) -> String {
    sha256_hex(normalize_markdown(markdown).as_bytes())
}

/// Canonical form of a page URL.
///
/// Lowercases scheme and host (the `url` crate does this), drops the
/// fragment and default port, and removes a trailing slash from any
/// path other than the root. The query string is preserved.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    let mut out = url.to_string();
    // `Url` always renders an empty path as "/"; keep "https://host" canonical.
    if url.path() == "/" && url.query().is_none() && out.ends_with('/') {
        out.pop();
    }
    Some(out)
}

/// Host of a URL without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// `source.` + full SHA-1 of the canonical URL.
pub fn source_page_id(canonical_url: &str) -> String {
    format!("source.{}", sha1_hex(canonical_url))
}

/// Claim type namespace used inside claim ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Step,
    Fee,
    Faq,
    DocumentRequirement,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Fee => "fee",
            Self::Faq => "faq",
            Self::DocumentRequirement => "document_requirement",
        }
    }
}

impl std::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `canonical_url \n type \n locator \n payload_fingerprint`.
pub fn fingerprint(
    canonical_url: &str,
    claim_type: ClaimType,
    locator: &str,
    payload_fingerprint: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        canonical_url,
        claim_type.as_str(),
        locator,
        payload_fingerprint
    )
}

/// Project payload fields into a fingerprint: each part normalized, joined by `\n`.
///
/// `None` parts contribute an empty line so field positions never shift.
pub fn payload_fingerprint(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .map(|p| p.map(normalize_for_fingerprint).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `claim.<type>.<service_key>.<first 16 hex of sha1(fingerprint)>`.
pub fn claim_id(claim_type: ClaimType, service_key: &str, fingerprint: &str) -> String {
    let digest = sha1_hex(fingerprint);
    format!("claim.{}.{}.{}", claim_type.as_str(), service_key, &digest[..16])
}

/// Fixed domain → service table.
const SERVICE_MAP: &[(&str, &str)] = &[
    ("epassport.gov.bd", "svc.epassport"),
    ("nidw.gov.bd", "svc.nid"),
    ("services.nidw.gov.bd", "svc.nid"),
    ("bsp.brta.gov.bd", "svc.brta"),
    ("brta.gov.bd", "svc.brta"),
    ("bdris.gov.bd", "svc.bdris"),
    ("everify.bdris.gov.bd", "svc.bdris"),
    ("customs.gov.bd", "svc.customs"),
    ("nbr.gov.bd", "svc.nbr"),
    ("teletalk.com.bd", "svc.teletalk"),
    ("landadministration.gov.bd", "svc.land"),
];

/// Fixed agency table: (domain, agency_id, name).
const AGENCY_MAP: &[(&str, &str, &str)] = &[
    ("epassport.gov.bd", "agency.dip", "Department of Immigration and Passports"),
    ("nidw.gov.bd", "agency.ec", "Bangladesh Election Commission"),
    ("brta.gov.bd", "agency.brta", "Bangladesh Road Transport Authority"),
    ("bdris.gov.bd", "agency.orgbdr", "Office of the Registrar General, Birth and Death Registration"),
    ("customs.gov.bd", "agency.nbr", "National Board of Revenue"),
    ("nbr.gov.bd", "agency.nbr", "National Board of Revenue"),
    ("teletalk.com.bd", "agency.teletalk", "Teletalk Bangladesh Limited"),
    ("landadministration.gov.bd", "agency.mol", "Ministry of Land"),
];

const DERIVED_SUFFIXES: &[&str] = &[".gov.bd", ".com.bd", ".org.bd"];

fn bare_host(domain: &str) -> String {
    let lower = domain.trim().trim_end_matches('.').to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

/// Find the entry for `host` or its nearest listed parent domain.
fn lookup_by_host<'a, T>(host: &str, table: &'a [T], key: impl Fn(&T) -> &str) -> Option<&'a T> {
    let mut candidate = host;
    loop {
        if let Some(entry) = table.iter().find(|e| key(e) == candidate) {
            return Some(entry);
        }
        match candidate.split_once('.') {
            Some((_, rest)) if rest.contains('.') => candidate = rest,
            _ => return None,
        }
    }
}

/// Service key derived for a domain absent from the fixed table.
///
/// Strips `gov.bd|com.bd|org.bd` and replaces `.` with `_`.
pub fn derive_service_key(domain: &str) -> String {
    let host = bare_host(domain);
    let stem = DERIVED_SUFFIXES
        .iter()
        .find_map(|suffix| host.strip_suffix(suffix))
        .unwrap_or(&host);
    stem.replace('.', "_")
}

/// `svc.<key>` for a domain.
pub fn service_id_for_domain(domain: &str) -> String {
    let host = bare_host(domain);
    lookup_by_host(&host, SERVICE_MAP, |e| e.0)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| format!("svc.{}", derive_service_key(&host)))
}

/// The `svc.` suffix of the service id for a domain.
pub fn service_key_for_domain(domain: &str) -> String {
    let id = service_id_for_domain(domain);
    id.strip_prefix("svc.").unwrap_or(&id).to_string()
}

/// Agency id and display name for a domain.
pub fn agency_for_domain(domain: &str) -> (String, String) {
    let host = bare_host(domain);
    match lookup_by_host(&host, AGENCY_MAP, |e| e.0) {
        Some((_, id, name)) => (id.to_string(), name.to_string()),
        None => (format!("agency.{}", derive_service_key(&host)), host),
    }
}

/// Registrable domain: last three labels under a two-level `.bd` suffix,
/// last two labels otherwise.
pub fn registrable_domain(host: &str) -> String {
    let host = bare_host(host);
    let labels: Vec<&str> = host.split('.').collect();
    let two_level_bd = labels.len() >= 3
        && labels[labels.len() - 1] == "bd"
        && matches!(
            labels[labels.len() - 2],
            "gov" | "com" | "org" | "edu" | "net" | "ac" | "mil" | "info"
        );
    let keep = if two_level_bd { 3 } else { 2 };
    if labels.len() <= keep {
        host
    } else {
        labels[labels.len() - keep..].join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_fingerprint() {
        assert_eq!(normalize_for_fingerprint("  Visit   the\tPortal \n"), "visit the portal");
        assert_eq!(normalize_for_fingerprint(""), "");
    }

    #[test]
    fn test_source_page_id_format() {
        let id = source_page_id("https://www.epassport.gov.bd/instructions/passport-fees");
        assert!(id.starts_with("source."));
        assert_eq!(id.len(), "source.".len() + 40);
        assert_eq!(id, source_page_id("https://www.epassport.gov.bd/instructions/passport-fees"));
    }

    #[test]
    fn test_claim_id_format() {
        let fp = fingerprint("https://x.gov.bd/a", ClaimType::Fee, "Fees", "fee\n6900\nbdt\nexpress");
        let id = claim_id(ClaimType::Fee, "epassport", &fp);
        assert!(id.starts_with("claim.fee.epassport."));
        assert_eq!(id.rsplit('.').next().map(str::len), Some(16));
        assert!(!id.contains("auto_"));
    }

    #[test]
    fn test_fingerprint_ignores_whitespace_and_case() {
        let a = payload_fingerprint(&[Some("Visit  the Portal"), None]);
        let b = payload_fingerprint(&[Some(" visit the portal "), None]);
        assert_eq!(a, b);
        assert_eq!(a, "visit the portal\n");
    }

    #[test]
    fn test_service_map() {
        assert_eq!(service_id_for_domain("epassport.gov.bd"), "svc.epassport");
        assert_eq!(service_id_for_domain("www.epassport.gov.bd"), "svc.epassport");
        assert_eq!(service_id_for_domain("nidw.gov.bd"), "svc.nid");
        assert_eq!(service_id_for_domain("bsp.brta.gov.bd"), "svc.brta");
        assert_eq!(service_id_for_domain("teletalk.com.bd"), "svc.teletalk");
        assert_eq!(service_id_for_domain("landadministration.gov.bd"), "svc.land");
        assert_eq!(service_key_for_domain("customs.gov.bd"), "customs");
    }

    #[test]
    fn test_unknown_domain_derives_key() {
        assert_eq!(service_id_for_domain("dncrp.gov.bd"), "svc.dncrp");
        assert_eq!(service_id_for_domain("www.passport.dhaka.gov.bd"), "svc.passport_dhaka");
        assert_eq!(service_id_for_domain("example.org"), "svc.example_org");
        assert_eq!(derive_service_key("bkash.com.bd"), "bkash");
    }

    #[test]
    fn test_subdomain_inherits_parent_entry() {
        assert_eq!(service_id_for_domain("portal.bdris.gov.bd"), "svc.bdris");
        let (agency, _) = agency_for_domain("bsp.brta.gov.bd");
        assert_eq!(agency, "agency.brta");
    }

    #[test]
    fn test_canonicalize_url() {
        assert_eq!(
            canonicalize_url("HTTPS://WWW.EPassport.gov.bd/instructions/passport-fees/#top").as_deref(),
            Some("https://www.epassport.gov.bd/instructions/passport-fees")
        );
        assert_eq!(
            canonicalize_url("https://nidw.gov.bd/").as_deref(),
            Some("https://nidw.gov.bd")
        );
        assert_eq!(
            canonicalize_url("https://bdris.gov.bd/page?id=3").as_deref(),
            Some("https://bdris.gov.bd/page?id=3")
        );
        assert_eq!(canonicalize_url("mailto:someone@x.gov.bd"), None);
    }

    #[test]
    fn test_normalize_markdown() {
        assert_eq!(normalize_markdown("\r\n\n# Title  \r\nBody\t\n\n"), "# Title\nBody\n");
        assert_eq!(normalize_markdown("   \n"), "");
        assert_eq!(content_hash("# A\r\n"), content_hash("# A\n\n"));
        assert_eq!(content_hash("x").len(), 64);
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("bsp.brta.gov.bd"), "brta.gov.bd");
        assert_eq!(registrable_domain("www.epassport.gov.bd"), "epassport.gov.bd");
        assert_eq!(registrable_domain("teletalk.com.bd"), "teletalk.com.bd");
        assert_eq!(registrable_domain("docs.example.com"), "example.com");
    }
}
