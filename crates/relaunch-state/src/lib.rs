//! relaunch-state — durable storage for the stable revision record.
//!
//! The stable record is the only state that survives between runs. Every
//! rollback decision reads it, and only a fully verified deployment writes
//! it, so each backend guarantees a write is either fully visible or not
//! visible at all after a crash:
//!
//! - [`FileRevisionStore`] writes a sibling temp file and renames it over
//!   the record.
//! - [`RedbRevisionStore`] keeps the record as a single row updated inside
//!   one redb write transaction.

pub mod database;
pub mod error;
pub mod file;
pub mod store;
pub mod tables;

pub use database::RedbRevisionStore;
pub use error::{StateError, StateResult};
pub use file::FileRevisionStore;
pub use store::RevisionStore;
