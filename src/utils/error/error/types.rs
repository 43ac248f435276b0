//! Error types for the Gateway

use crate::core::transaction::TransactionError;
use crate::storage::StorageError;
use thiserror::Error;

/// Result type alias for the Gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the Gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request errors
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),

    /// No worker could be started for a dedicated batch
    #[error("Worker pool exhausted: {0}")]
    PoolExhausted(String),

    /// A worker stopped before it could accept or finish a unit of work
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// A unit of work panicked on its worker thread
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    /// Transaction primitive failures
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Storage failures
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The host entrypoint failed to produce a response
    #[error("Entrypoint error: {0}")]
    Entrypoint(String),

    /// Server startup / runtime errors
    #[error("Server error: {0}")]
    Server(String),
}
