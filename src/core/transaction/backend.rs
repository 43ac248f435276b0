//! Transaction primitives
//!
//! The storage layer's begin/commit/rollback operations, used as a black box.
//! Every call acts on the connection bound to the *calling thread*, which is
//! why the batch machinery runs them on its pinned worker.

use thiserror::Error;

/// Errors raised by transaction primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// commit / rollback with nothing open on this thread's connection
    #[error("no transaction is open on this connection")]
    NotOpen,

    /// The transaction was poisoned and has been rolled back instead
    #[error("transaction was marked for rollback and has been aborted")]
    Aborted,

    /// The handle was already committed or rolled back
    #[error("transaction handle is closed")]
    Closed,

    /// Anything the backend reports on its own
    #[error("transaction backend failure: {0}")]
    Backend(String),
}

/// Transaction primitives of the storage layer.
///
/// Nested `begin` calls open savepoints; `commit` and `rollback` close the
/// innermost open scope.
pub trait TransactionBackend: Send + Sync + 'static {
    fn begin(&self) -> Result<(), TransactionError>;

    fn commit(&self) -> Result<(), TransactionError>;

    fn rollback(&self) -> Result<(), TransactionError>;

    /// Whether an inner operation poisoned the current transaction
    fn needs_rollback(&self) -> bool;
}
