//! Content-addressed per-day page snapshots.
//!
//! Layout: `<root>/<source_page_id>/<YYYY-MM-DD>/{page.md, page.html?, meta.json}`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::write_atomic;
use crate::error::{KbError, KbResult};
use crate::identity;

const META_FILE: &str = "meta.json";
const MARKDOWN_FILE: &str = "page.md";
const HTML_FILE: &str = "page.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub canonical_url: String,
    pub source_page_id: String,
    pub fetched_at: DateTime<Utc>,
    pub content_hash_sha256: String,
    pub snapshot_date: NaiveDate,
}

/// Result of a `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotWrite {
    /// `snapshots/<id>/<date>`, relative to the KB root
    pub snapshot_ref: String,
    pub content_hash: String,
    /// False when today's snapshot already held the same content
    pub written: bool,
}

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// `root` is the `snapshots` directory itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn day_dir(&self, source_page_id: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(source_page_id)
            .join(date.format("%Y-%m-%d").to_string())
    }

    fn snapshot_ref(source_page_id: &str, date: NaiveDate) -> String {
        format!("snapshots/{}/{}", source_page_id, date.format("%Y-%m-%d"))
    }

    fn read_meta(dir: &Path) -> KbResult<Option<SnapshotMeta>> {
        let path = dir.join(META_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KbError::io(&path, e)),
        }
    }

    /// Store a snapshot dated by `fetched_at`.
    ///
    /// The markdown is normalized before hashing and storage. A second put
    /// on the same day only rewrites the files when the hash differs.
    pub fn put(
        &self,
        source_page_id: &str,
        canonical_url: &str,
        markdown: &str,
        html: Option<&str>,
        fetched_at: DateTime<Utc>,
    ) -> KbResult<SnapshotWrite> {
        let date = fetched_at.date_naive();
        let dir = self.day_dir(source_page_id, date);
        let normalized = identity::normalize_markdown(markdown);
        let content_hash = identity::sha256_hex(normalized.as_bytes());
        let snapshot_ref = Self::snapshot_ref(source_page_id, date);

        if let Some(existing) = Self::read_meta(&dir)? {
            if existing.content_hash_sha256 == content_hash {
                tracing::debug!(source_page_id = %source_page_id, "Snapshot unchanged, skipping write");
                return Ok(SnapshotWrite {
                    snapshot_ref,
                    content_hash,
                    written: false,
                });
            }
        }

        std::fs::create_dir_all(&dir).map_err(|e| KbError::io(&dir, e))?;
        write_atomic(&dir.join(MARKDOWN_FILE), normalized.as_bytes())?;
        let html_path = dir.join(HTML_FILE);
        match html.filter(|h| !h.trim().is_empty()) {
            Some(html) => write_atomic(&html_path, html.as_bytes())?,
            None => match std::fs::remove_file(&html_path) {
                Ok(()) => tracing::debug!(source_page_id = %source_page_id, "Removed stale page.html"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(KbError::io(&html_path, e)),
            },
        }

        let meta = SnapshotMeta {
            canonical_url: canonical_url.to_string(),
            source_page_id: source_page_id.to_string(),
            fetched_at,
            content_hash_sha256: content_hash.clone(),
            snapshot_date: date,
        };
        write_atomic(&dir.join(META_FILE), &serde_json::to_vec_pretty(&meta)?)?;

        Ok(SnapshotWrite {
            snapshot_ref,
            content_hash,
            written: true,
        })
    }

    pub fn exists_on(&self, source_page_id: &str, date: NaiveDate) -> bool {
        self.day_dir(source_page_id, date).join(META_FILE).is_file()
    }

    pub fn exists_today(&self, source_page_id: &str) -> bool {
        self.exists_on(source_page_id, Utc::now().date_naive())
    }

    /// Hash recorded by the most recent snapshot, if any.
    pub fn get_hash(&self, source_page_id: &str) -> KbResult<Option<String>> {
        Ok(self
            .latest_meta(source_page_id)?
            .map(|m| m.content_hash_sha256))
    }

    pub fn latest_meta(&self, source_page_id: &str) -> KbResult<Option<SnapshotMeta>> {
        let page_dir = self.root.join(source_page_id);
        let entries = match std::fs::read_dir(&page_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KbError::io(&page_dir, e)),
        };

        let mut dates: Vec<NaiveDate> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                NaiveDate::parse_from_str(&entry.file_name().to_string_lossy(), "%Y-%m-%d").ok()
            })
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));

        for date in dates {
            if let Some(meta) = Self::read_meta(&self.day_dir(source_page_id, date))? {
                return Ok(Some(meta));
            }
        }
        Ok(None)
    }

    /// Stored markdown for a given day.
    pub fn read_markdown(&self, source_page_id: &str, date: NaiveDate) -> KbResult<Option<String>> {
        let path = self.day_dir(source_page_id, date).join(MARKDOWN_FILE);
        match std::fs::read_to_string(&path) {
            Ok(md) => Ok(Some(md)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KbError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ID: &str = "source.0123456789abcdef0123456789abcdef01234567";
    const URL: &str = "https://www.epassport.gov.bd/instructions/passport-fees";

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_put_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let w = store.put(ID, URL, "# Fees\r\n\n", Some("<h1>Fees</h1>"), at(1)).unwrap();
        assert!(w.written);
        assert_eq!(w.snapshot_ref, format!("snapshots/{}/2025-03-01", ID));
        assert_eq!(w.content_hash, identity::content_hash("# Fees\n"));

        let day = dir.path().join(ID).join("2025-03-01");
        assert_eq!(std::fs::read_to_string(day.join("page.md")).unwrap(), "# Fees\n");
        assert!(day.join("page.html").is_file());

        let meta: SnapshotMeta =
            serde_json::from_str(&std::fs::read_to_string(day.join("meta.json")).unwrap()).unwrap();
        assert_eq!(meta.canonical_url, URL);
        assert_eq!(meta.content_hash_sha256, w.content_hash);
    }

    #[test]
    fn test_changed_put_without_html_drops_old_html() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let day = dir.path().join(ID).join("2025-03-01");

        store.put(ID, URL, "# Fees", Some("<h1>Fees</h1>"), at(1)).unwrap();
        assert!(day.join("page.html").is_file());

        let w = store.put(ID, URL, "# Fees\n- Fee: 500 BDT", None, at(1)).unwrap();
        assert!(w.written);
        assert!(!day.join("page.html").exists());
        assert_eq!(
            store.read_markdown(ID, at(1).date_naive()).unwrap().as_deref(),
            Some("# Fees\n- Fee: 500 BDT\n")
        );
    }

    #[test]
    fn test_same_day_same_content_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        assert!(store.put(ID, URL, "a", None, at(2)).unwrap().written);
        assert!(!store.put(ID, URL, "a\n", None, at(2)).unwrap().written);
        assert!(store.put(ID, URL, "b", None, at(2)).unwrap().written);
        assert_eq!(
            store.read_markdown(ID, at(2).date_naive()).unwrap().as_deref(),
            Some("b\n")
        );
    }

    #[test]
    fn test_get_hash_uses_latest_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        assert_eq!(store.get_hash(ID).unwrap(), None);
        store.put(ID, URL, "old", None, at(1)).unwrap();
        let newer = store.put(ID, URL, "new", None, at(5)).unwrap();
        assert_eq!(store.get_hash(ID).unwrap(), Some(newer.content_hash));
        assert!(store.exists_on(ID, at(1).date_naive()));
        assert!(!store.exists_on(ID, at(3).date_naive()));
    }
}
