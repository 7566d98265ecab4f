//! KB writer: load, index, upsert, save.
//!
//! The KB is held in memory for the whole run. Id → position indexes are
//! rebuilt on load and kept in step with every mutation; they are never
//! persisted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::write_json_atomic;
use crate::error::{KbError, KbResult};
use crate::identity;
use crate::types::claim::Claim;
use crate::types::kb::{Agency, KbChange, KnowledgeBase, Service, ServiceGuide};
use crate::types::page::{PageChange, SourcePage};

/// Outcome of a source-page upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageUpsert {
    Inserted,
    Updated { previous_hash: String },
    Unchanged,
}

pub struct KbWriter {
    path: PathBuf,
    kb: KnowledgeBase,
    claim_index: HashMap<String, usize>,
    page_index: HashMap<String, usize>,
    agency_index: HashMap<String, usize>,
    service_index: HashMap<String, usize>,
    guide_index: HashMap<String, usize>,
}

fn build_index<T>(
    items: &[T],
    kind: &'static str,
    id_of: impl Fn(&T) -> &str,
) -> KbResult<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        let id = id_of(item);
        if index.insert(id.to_string(), pos).is_some() {
            return Err(KbError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(index)
}

fn verify_index<T>(
    index: &HashMap<String, usize>,
    items: &[T],
    kind: &'static str,
    id_of: impl Fn(&T) -> &str,
) -> KbResult<()> {
    if index.len() != items.len() {
        return Err(KbError::IndexCorrupt {
            kind,
            id: format!("<{} indexed, {} stored>", index.len(), items.len()),
        });
    }
    for (id, pos) in index {
        if items.get(*pos).map(&id_of) != Some(id.as_str()) {
            return Err(KbError::IndexCorrupt {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(())
}

impl KbWriter {
    /// Load the KB at `path`; a missing file yields an empty KB.
    pub fn load(path: impl Into<PathBuf>) -> KbResult<Self> {
        let path = path.into();
        let kb = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No KB file yet, starting empty");
                KnowledgeBase::default()
            }
            Err(e) => return Err(KbError::io(&path, e)),
        };
        Self::from_kb(path, kb)
    }

    pub fn from_kb(path: impl Into<PathBuf>, kb: KnowledgeBase) -> KbResult<Self> {
        let writer = Self {
            path: path.into(),
            claim_index: build_index(&kb.claims, "claim", |c| &c.claim_id)?,
            page_index: build_index(&kb.source_pages, "source_page", |p| &p.source_page_id)?,
            agency_index: build_index(&kb.agencies, "agency", |a| &a.agency_id)?,
            service_index: build_index(&kb.services, "service", |s| &s.service_id)?,
            guide_index: build_index(&kb.service_guides, "service_guide", |g| &g.guide_id)?,
            kb,
        };
        tracing::debug!(
            claims = writer.kb.claims.len(),
            source_pages = writer.kb.source_pages.len(),
            data_version = writer.kb.data_version,
            "KB loaded"
        );
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kb(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn into_kb(self) -> KnowledgeBase {
        self.kb
    }

    /// Every index resolves to the entity it names.
    pub fn check_invariants(&self) -> KbResult<()> {
        verify_index(&self.claim_index, &self.kb.claims, "claim", |c| &c.claim_id)?;
        verify_index(&self.page_index, &self.kb.source_pages, "source_page", |p| {
            &p.source_page_id
        })?;
        verify_index(&self.agency_index, &self.kb.agencies, "agency", |a| &a.agency_id)?;
        verify_index(&self.service_index, &self.kb.services, "service", |s| &s.service_id)?;
        verify_index(&self.guide_index, &self.kb.service_guides, "service_guide", |g| {
            &g.guide_id
        })
    }

    pub fn source_page(&self, source_page_id: &str) -> Option<&SourcePage> {
        self.page_index
            .get(source_page_id)
            .map(|pos| &self.kb.source_pages[*pos])
    }

    pub fn has_claim(&self, claim_id: &str) -> bool {
        self.claim_index.contains_key(claim_id)
    }

    pub fn claim(&self, claim_id: &str) -> Option<&Claim> {
        self.claim_index.get(claim_id).map(|pos| &self.kb.claims[*pos])
    }

    pub fn guide(&self, guide_id: &str) -> Option<&ServiceGuide> {
        self.guide_index
            .get(guide_id)
            .map(|pos| &self.kb.service_guides[*pos])
    }

    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.service_index
            .get(service_id)
            .map(|pos| &self.kb.services[*pos])
    }

    /// Insert a new page, or fold a fresh crawl into the existing record.
    pub fn upsert_source_page(&mut self, page: SourcePage) -> PageUpsert {
        let Some(&pos) = self.page_index.get(&page.source_page_id) else {
            self.page_index
                .insert(page.source_page_id.clone(), self.kb.source_pages.len());
            self.kb.source_pages.push(page);
            return PageUpsert::Inserted;
        };

        let existing = &mut self.kb.source_pages[pos];
        existing.last_crawled_at = page.last_crawled_at;
        if page.title.is_some() {
            existing.title = page.title;
        }
        if !page.page_type.is_empty() {
            existing.page_type = page.page_type;
        }
        if !page.language.is_empty() {
            existing.language = page.language;
        }
        if page.snapshot_ref.is_some() {
            existing.snapshot_ref = page.snapshot_ref;
        }

        if !existing.content_changed(&page.content_hash) {
            return PageUpsert::Unchanged;
        }

        let previous_hash = std::mem::replace(&mut existing.content_hash, page.content_hash.clone());
        existing.change_log.push(PageChange {
            detected_at: page.last_crawled_at,
            hash_before: previous_hash.clone(),
            hash_after: page.content_hash,
        });
        existing.previous_hash = Some(previous_hash.clone());
        PageUpsert::Updated { previous_hash }
    }

    /// Append a claim unless its id is already present. Returns the count added.
    pub fn upsert_claim(&mut self, claim: Claim) -> usize {
        if self.has_claim(&claim.claim_id) {
            return 0;
        }
        self.claim_index
            .insert(claim.claim_id.clone(), self.kb.claims.len());
        self.kb.claims.push(claim);
        1
    }

    pub fn upsert_claims(&mut self, claims: impl IntoIterator<Item = Claim>) -> usize {
        claims.into_iter().map(|c| self.upsert_claim(c)).sum()
    }

    /// Make sure the agency owning `domain` exists; returns its id.
    pub fn ensure_agency(&mut self, domain: &str) -> String {
        let (agency_id, name) = identity::agency_for_domain(domain);
        let domain = identity::registrable_domain(domain);
        match self.agency_index.get(&agency_id) {
            Some(&pos) => {
                let agency = &mut self.kb.agencies[pos];
                if !agency.domains.contains(&domain) {
                    agency.domains.push(domain);
                }
            }
            None => {
                self.agency_index
                    .insert(agency_id.clone(), self.kb.agencies.len());
                self.kb.agencies.push(Agency {
                    agency_id: agency_id.clone(),
                    name,
                    domains: vec![domain],
                });
            }
        }
        agency_id
    }

    /// Make sure the service for `domain` exists (and its agency); returns its id.
    pub fn ensure_service(&mut self, domain: &str, label: &str) -> String {
        let service_id = identity::service_id_for_domain(domain);
        let agency_id = self.ensure_agency(domain);
        let host = domain.trim_start_matches("www.").to_lowercase();
        match self.service_index.get(&service_id) {
            Some(&pos) => {
                let service = &mut self.kb.services[pos];
                if !service.domains.contains(&host) {
                    service.domains.push(host);
                }
            }
            None => {
                self.service_index
                    .insert(service_id.clone(), self.kb.services.len());
                self.kb.services.push(Service {
                    service_id: service_id.clone(),
                    agency_id,
                    name: label.to_string(),
                    domains: vec![host],
                });
            }
        }
        service_id
    }

    /// Insert or replace a guide by id.
    pub fn upsert_guide(&mut self, guide: ServiceGuide) {
        match self.guide_index.get(&guide.guide_id) {
            Some(&pos) => self.kb.service_guides[pos] = guide,
            None => {
                self.guide_index
                    .insert(guide.guide_id.clone(), self.kb.service_guides.len());
                self.kb.service_guides.push(guide);
            }
        }
    }

    /// `(claim_id, source_page_id)` for every citation pointing at a missing page.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        self.kb
            .claims
            .iter()
            .flat_map(|claim| {
                claim
                    .cited_pages()
                    .filter(|id| !self.page_index.contains_key(*id))
                    .map(|id| (claim.claim_id.clone(), id.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Bump the version, log the change and write the KB atomically.
    pub fn save(&mut self, summary: impl Into<String>) -> KbResult<u64> {
        self.save_at(summary, Utc::now())
    }

    pub fn save_at(&mut self, summary: impl Into<String>, at: DateTime<Utc>) -> KbResult<u64> {
        self.kb.data_version += 1;
        self.kb.last_updated_at = Some(at);
        self.kb.change_log.push(KbChange {
            at,
            data_version: self.kb.data_version,
            summary: summary.into(),
        });
        write_json_atomic(&self.path, &self.kb)?;
        tracing::info!(
            path = %self.path.display(),
            data_version = self.kb.data_version,
            claims = self.kb.claims.len(),
            "KB saved"
        );
        Ok(self.kb.data_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ClaimType;
    use crate::types::claim::{Citation, ClaimPayload, ClaimStatus, EntityRef, Locator};
    use crate::types::page::Language;

    fn claim(id: &str, page_id: &str) -> Claim {
        Claim {
            claim_id: id.to_string(),
            claim_type: ClaimType::Fee,
            entity_ref: EntityRef::service("svc.epassport"),
            text: "Regular delivery: 4025 BDT".into(),
            structured_data: ClaimPayload::Fee {
                label: "Regular delivery".into(),
                amount: 4025.0,
                currency: "BDT".into(),
                variant: Some("regular".into()),
            },
            citations: vec![Citation::new(
                page_id,
                "https://www.epassport.gov.bd/instructions/passport-fees",
                "- Regular delivery: BDT 4,025",
                Locator::heading_path(&[]),
                Utc::now(),
                Language::En,
            )],
            status: ClaimStatus::Unverified,
            tags: vec!["auto_extracted".into()],
            created_at: Utc::now(),
            last_verified_at: None,
        }
    }

    #[test]
    fn test_upsert_claim_dedupes_by_id() {
        let mut w = KbWriter::from_kb("kb.json", KnowledgeBase::default()).unwrap();
        assert_eq!(w.upsert_claim(claim("claim.fee.epassport.a", "source.x")), 1);
        assert_eq!(w.upsert_claim(claim("claim.fee.epassport.a", "source.x")), 0);
        assert_eq!(
            w.upsert_claims(vec![
                claim("claim.fee.epassport.b", "source.x"),
                claim("claim.fee.epassport.a", "source.x"),
            ]),
            1
        );
        assert_eq!(w.kb().claims.len(), 2);
        w.check_invariants().unwrap();
    }

    #[test]
    fn test_source_page_change_log() {
        let mut w = KbWriter::from_kb("kb.json", KnowledgeBase::default()).unwrap();
        let url = "https://nidw.gov.bd/faq";

        assert_eq!(w.upsert_source_page(SourcePage::new(url, "h1")), PageUpsert::Inserted);
        assert_eq!(w.upsert_source_page(SourcePage::new(url, "h1")), PageUpsert::Unchanged);
        assert_eq!(
            w.upsert_source_page(SourcePage::new(url, "h2")),
            PageUpsert::Updated {
                previous_hash: "h1".into()
            }
        );

        let page = w.source_page(&identity::source_page_id(url)).unwrap();
        assert_eq!(page.content_hash, "h2");
        assert_eq!(page.previous_hash.as_deref(), Some("h1"));
        assert_eq!(page.change_log.len(), 1);
        assert_eq!(page.change_log[0].hash_before, "h1");
        assert_eq!(w.kb().source_pages.len(), 1);
        w.check_invariants().unwrap();
    }

    #[test]
    fn test_ensure_agency_and_service() {
        let mut w = KbWriter::from_kb("kb.json", KnowledgeBase::default()).unwrap();
        assert_eq!(w.ensure_service("www.epassport.gov.bd", "e-Passport"), "svc.epassport");
        assert_eq!(w.ensure_service("epassport.gov.bd", "e-Passport"), "svc.epassport");
        assert_eq!(w.ensure_agency("bsp.brta.gov.bd"), "agency.brta");
        assert_eq!(w.kb().agencies.len(), 2);
        assert_eq!(w.kb().services.len(), 1);
        assert_eq!(w.service("svc.epassport").unwrap().agency_id, "agency.dip");
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let mut kb = KnowledgeBase::default();
        kb.claims.push(claim("claim.fee.x.1", "source.a"));
        kb.claims.push(claim("claim.fee.x.1", "source.a"));
        assert!(matches!(
            KbWriter::from_kb("kb.json", kb),
            Err(KbError::DuplicateId { kind: "claim", .. })
        ));
    }

    #[test]
    fn test_dangling_references() {
        let mut w = KbWriter::from_kb("kb.json", KnowledgeBase::default()).unwrap();
        let url = "https://www.epassport.gov.bd/instructions/passport-fees";
        let page = SourcePage::new(url, "h");
        let page_id = page.source_page_id.clone();
        w.upsert_claim(claim("claim.fee.epassport.a", &page_id));
        assert_eq!(w.dangling_references().len(), 1);
        w.upsert_source_page(page);
        assert!(w.dangling_references().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");

        let mut w = KbWriter::load(&path).unwrap();
        w.ensure_service("nidw.gov.bd", "NID");
        w.upsert_claim(claim("claim.fee.nid.a", "source.x"));
        assert_eq!(w.save("first").unwrap(), 1);

        let mut reloaded = KbWriter::load(&path).unwrap();
        assert_eq!(reloaded.kb().claims.len(), 1);
        assert_eq!(reloaded.kb().services.len(), 1);
        assert_eq!(reloaded.kb().change_log.len(), 1);
        assert_eq!(reloaded.save("second").unwrap(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"$schema_version\""));
        assert!(!raw.contains("claim_index"));
    }
}
