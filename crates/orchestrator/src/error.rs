//! Error types for orchestration operations.

use thiserror::Error;

/// Errors that can occur during request orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed request or envelope. Rejected with no side effects.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),

    /// Agent runtime call failed.
    #[error("agent runtime error: {0}")]
    Runtime(String),

    /// A dependency (broker, delivery engine) was unreachable.
    #[error("dependency unavailable: {0}")]
    Dependency(String),

    /// Payload encoding/decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
