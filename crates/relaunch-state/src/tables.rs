//! redb table definitions for the revision store.

use redb::TableDefinition;

/// The stable revision record, JSON-encoded, under [`STABLE_KEY`].
pub const STABLE_REVISION: TableDefinition<&str, &[u8]> = TableDefinition::new("stable_revision");

/// The only key ever written to [`STABLE_REVISION`].
pub const STABLE_KEY: &str = "stable";
