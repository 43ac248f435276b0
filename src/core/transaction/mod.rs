//! Batch transactions on a pinned worker

mod backend;
mod protocol;

pub use backend::{TransactionBackend, TransactionError};
pub use protocol::{Checkpoint, Decision, RollbackCause, TransactionHandle, TransactionState};
