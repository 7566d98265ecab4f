//! File-backed stores.
//!
//! - `SnapshotStore` - per-day page snapshots
//! - `KbWriter` - the KB document with in-memory indexes

pub mod kb;
pub mod snapshot;

use std::io::Write;
use std::path::Path;

use crate::error::{KbError, KbResult};

pub use kb::{KbWriter, PageUpsert};
pub use snapshot::{SnapshotMeta, SnapshotStore, SnapshotWrite};

/// Write `bytes` to `path` via a temp file in the same directory and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> KbResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| KbError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| KbError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| KbError::io(path, e))?;
    tmp.flush().map_err(|e| KbError::io(path, e))?;
    tmp.persist(path).map_err(|e| KbError::io(path, e.error))?;
    Ok(())
}

/// Pretty JSON, written atomically.
pub(crate) fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> KbResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}
