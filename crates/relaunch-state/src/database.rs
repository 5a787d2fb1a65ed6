//! redb-backed revision store.
//!
//! Keeps the stable record as one JSON row. A redb write transaction is
//! durable on commit and invisible if the process dies before it, which
//! gives the same all-or-nothing guarantee as the file backend.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase};
use relaunch_core::StableRevisionRecord;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::RevisionStore;
use crate::tables::{STABLE_KEY, STABLE_REVISION};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe revision store backed by redb.
#[derive(Clone)]
pub struct RedbRevisionStore {
    db: Arc<Database>,
}

impl RedbRevisionStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(map_err!(Open))?;
        }
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "revision store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory revision store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(STABLE_REVISION).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl RevisionStore for RedbRevisionStore {
    fn read(&self) -> StateResult<Option<StableRevisionRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STABLE_REVISION).map_err(map_err!(Table))?;
        match table.get(STABLE_KEY).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: StableRevisionRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Corrupt))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn write(&self, record: &StableRevisionRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(STABLE_REVISION).map_err(map_err!(Table))?;
            table
                .insert(STABLE_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(commit = %record.commit, "stable record stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaunch_core::Revision;

    fn record(commit: &str, at: u64) -> StableRevisionRecord {
        StableRevisionRecord::new(Revision::new(commit).unwrap(), at)
    }

    #[test]
    fn empty_store_reads_none() {
        let store = RedbRevisionStore::open_in_memory().unwrap();
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn write_overwrites_single_row() {
        let store = RedbRevisionStore::open_in_memory().unwrap();
        store.write(&record("rev-A", 1)).unwrap();
        store.write(&record("rev-B", 2)).unwrap();
        assert_eq!(store.read().unwrap(), Some(record("rev-B", 2)));
    }

    #[test]
    fn clones_share_the_database() {
        let store = RedbRevisionStore::open_in_memory().unwrap();
        let other = store.clone();
        store.write(&record("rev-A", 1)).unwrap();
        assert_eq!(
            other.stable_revision().unwrap(),
            Some(Revision::new("rev-A").unwrap())
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("relaunch.redb");
        {
            let store = RedbRevisionStore::open(&path).unwrap();
            store.write(&record("rev-A", 7)).unwrap();
        }
        let store = RedbRevisionStore::open(&path).unwrap();
        assert_eq!(store.read().unwrap(), Some(record("rev-A", 7)));
    }
}
