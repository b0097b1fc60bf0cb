//! Error types for the nicfaas placement store.

use thiserror::Error;

/// Result type alias for placement store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during placement store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected store response: {0}")]
    Protocol(String),

    #[error("malformed value at {key}: {value:?}")]
    Malformed { key: String, value: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid name {0:?}: must be a single non-empty key segment")]
    InvalidName(String),
}

impl StateError {
    /// True for a lookup miss, which callers usually treat as a normal outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}
