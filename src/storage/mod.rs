//! Storage layer
//!
//! An in-memory, transactional table store. Each OS thread talks to it through
//! its own connection, so transaction scopes opened on one thread are invisible
//! to every other thread until they commit.

pub mod memory;

pub use memory::MemoryDatabase;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("{table} {id} not found")]
    NotFound { table: String, id: String },

    #[error("{table} with this {field} already exists")]
    UniqueViolation { table: String, field: String },

    /// The connection's transaction is marked for rollback
    #[error("an error occurred in the current transaction; no further operations until rollback")]
    TransactionAborted,

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid row: {0}")]
    InvalidRow(String),
}
