//! Error types for the Fleet state repository.

use thiserror::Error;

/// Result type alias for state repository operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state repository operations.
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

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("state repository unavailable: {0}")]
    Unavailable(String),
}
