//! The revision store seam.

use relaunch_core::{Revision, StableRevisionRecord};

use crate::error::StateResult;

/// Read/write access to the stable revision record.
pub trait RevisionStore: Send + Sync {
    /// The current record, or `None` before the first successful deployment.
    fn read(&self) -> StateResult<Option<StableRevisionRecord>>;

    /// Replace the record atomically.
    fn write(&self, record: &StableRevisionRecord) -> StateResult<()>;

    /// Shorthand for the committed revision alone.
    fn stable_revision(&self) -> StateResult<Option<Revision>> {
        Ok(self.read()?.map(|record| record.commit))
    }
}
