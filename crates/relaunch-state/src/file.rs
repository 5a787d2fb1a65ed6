//! File-backed revision store.
//!
//! The record is a small JSON document. Writes go to a temp file in the
//! same directory, are flushed to disk, and are then renamed over the
//! target, so readers see either the old record or the new one.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use relaunch_core::StableRevisionRecord;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::RevisionStore;

macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

#[derive(Debug, Clone)]
pub struct FileRevisionStore {
    path: PathBuf,
}

impl FileRevisionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RevisionStore for FileRevisionStore {
    fn read(&self) -> StateResult<Option<StableRevisionRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "no stable record on disk");
                return Ok(None);
            }
            Err(e) => return Err(StateError::Read(format!("{}: {e}", self.path.display()))),
        };
        let record: StableRevisionRecord = serde_json::from_slice(&bytes)
            .map_err(|e| StateError::Corrupt(format!("{}: {e}", self.path.display())))?;
        Ok(Some(record))
    }

    fn write(&self, record: &StableRevisionRecord) -> StateResult<()> {
        let mut data = serde_json::to_vec_pretty(record).map_err(map_err!(Serialize))?;
        data.push(b'\n');
        atomic_write(&self.path, &data)?;
        debug!(path = ?self.path, commit = %record.commit, "stable record written");
        Ok(())
    }
}

/// Write `data` to a temp file next to `path`, sync it, and rename it into place.
fn atomic_write(path: &Path, data: &[u8]) -> StateResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(map_err!(Write))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(map_err!(Write))?;
    tmp.write_all(data).map_err(map_err!(Write))?;
    tmp.as_file().sync_all().map_err(map_err!(Write))?;
    tmp.persist(path).map_err(|e| StateError::Write(e.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaunch_core::Revision;

    fn record(commit: &str, at: u64) -> StableRevisionRecord {
        StableRevisionRecord::new(Revision::new(commit).unwrap(), at)
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRevisionStore::new(dir.path().join("stable.json"));
        assert_eq!(store.read().unwrap(), None);
        assert_eq!(store.stable_revision().unwrap(), None);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRevisionStore::new(dir.path().join("stable.json"));

        store.write(&record("rev-A", 100)).unwrap();
        assert_eq!(store.read().unwrap(), Some(record("rev-A", 100)));

        store.write(&record("rev-B", 200)).unwrap();
        assert_eq!(
            store.stable_revision().unwrap(),
            Some(Revision::new("rev-B").unwrap())
        );
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".relaunch").join("nested").join("stable.json");
        let store = FileRevisionStore::new(&path);
        store.write(&record("rev-A", 1)).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRevisionStore::new(dir.path().join("stable.json"));
        store.write(&record("rev-A", 1)).unwrap();
        store.write(&record("rev-B", 2)).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("stable.json")]);
    }

    #[test]
    fn corrupt_file_is_an_error_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stable.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileRevisionStore::new(&path);
        assert!(matches!(store.read(), Err(StateError::Corrupt(_))));
    }

    #[test]
    fn record_without_timestamp_still_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stable.json");
        std::fs::write(&path, r#"{"commit":"rev-A"}"#).unwrap();

        let store = FileRevisionStore::new(&path);
        assert_eq!(store.read().unwrap(), Some(record("rev-A", 0)));
    }
}
