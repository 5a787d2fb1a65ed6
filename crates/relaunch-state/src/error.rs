//! Error types for the revision store.

use thiserror::Error;

/// Result type alias for revision store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing the stable record.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open store: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupt stable record: {0}")]
    Corrupt(String),
}
