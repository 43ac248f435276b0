//! Transaction recovery protocol
//!
//! One [`TransactionHandle`] per pinned worker:
//!
//! ```text
//! Closed --begin--> Open(clean) --inner failure--> Open(poisoned)
//!                        ^                               |
//!                        +------ checkpoint: rollback ---+
//!                                + begin
//! Open --commit / rollback--> Closed
//! ```
//!
//! Every primitive runs on the pinned worker so it reaches the same
//! connection as the sub-requests. `commit` / `rollback` are chosen by the
//! batch after the last item, never by an individual sub-request.

use super::backend::{TransactionBackend, TransactionError};
use crate::core::pool::PinnedWorker;
use crate::utils::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Observable state of a transaction handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Closed,
    Open,
}

/// What a checkpoint found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// The transaction was usable as is
    Clean,
    /// The transaction was poisoned; it was rolled back and reopened
    Recovered,
}

/// Why a batch is being rolled back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackCause {
    /// Items (by index) that reported a status >= 400
    FailedItems(Vec<usize>),
    /// Items (by index) after which a poisoned transaction had to be reopened
    Recovered(Vec<usize>),
    /// The batch stopped on an unexpected error
    Aborted(String),
}

impl fmt::Display for RollbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackCause::FailedItems(items) => write!(f, "failed items {:?}", items),
            RollbackCause::Recovered(items) => {
                write!(f, "transaction recovered after items {:?}", items)
            }
            RollbackCause::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Final outcome of an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Commit,
    Rollback(RollbackCause),
}

impl Decision {
    /// Decide from the whole batch: any failed item, then any recovered
    /// poisoning, forces a rollback.
    pub fn from_batch(failed: Vec<usize>, recovered: Vec<usize>) -> Self {
        if !failed.is_empty() {
            Decision::Rollback(RollbackCause::FailedItems(failed))
        } else if !recovered.is_empty() {
            Decision::Rollback(RollbackCause::Recovered(recovered))
        } else {
            Decision::Commit
        }
    }

    pub fn is_commit(&self) -> bool {
        matches!(self, Decision::Commit)
    }
}

/// Open transaction on a pinned worker's connection
pub struct TransactionHandle<'w> {
    worker: &'w PinnedWorker,
    backend: Arc<dyn TransactionBackend>,
    state: TransactionState,
}

impl<'w> TransactionHandle<'w> {
    /// Open a transaction on the pinned worker
    pub async fn begin(
        worker: &'w PinnedWorker,
        backend: Arc<dyn TransactionBackend>,
    ) -> Result<Self> {
        let b = Arc::clone(&backend);
        worker.submit(move || b.begin()).await??;
        debug!(worker_id = %worker.worker_id(), "Batch transaction opened");

        Ok(Self {
            worker,
            backend,
            state: TransactionState::Open,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Repair a poisoned transaction so later sub-requests can keep working.
    ///
    /// Already recorded results are not touched.
    pub async fn checkpoint(&mut self) -> Result<Checkpoint> {
        if self.state != TransactionState::Open {
            return Err(TransactionError::Closed.into());
        }

        let b = Arc::clone(&self.backend);
        let (state, outcome) = self
            .worker
            .submit(move || {
                if !b.needs_rollback() {
                    return (TransactionState::Open, Ok(Checkpoint::Clean));
                }
                if let Err(e) = b.rollback() {
                    return (TransactionState::Closed, Err(e));
                }
                match b.begin() {
                    Ok(()) => (TransactionState::Open, Ok(Checkpoint::Recovered)),
                    Err(e) => (TransactionState::Closed, Err(e)),
                }
            })
            .await?;

        self.state = state;
        if matches!(outcome, Ok(Checkpoint::Recovered)) {
            warn!(worker_id = %self.worker.worker_id(), "Poisoned transaction rolled back and reopened");
        }
        Ok(outcome?)
    }

    /// Close the transaction as decided
    pub async fn finish(mut self, decision: &Decision) -> Result<()> {
        match decision {
            Decision::Commit => self.commit().await,
            Decision::Rollback(cause) => self.rollback(cause).await,
        }
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.close()?;
        let b = Arc::clone(&self.backend);
        self.worker.submit(move || b.commit()).await??;
        info!(worker_id = %self.worker.worker_id(), "Batch transaction committed");
        Ok(())
    }

    pub async fn rollback(&mut self, cause: &RollbackCause) -> Result<()> {
        self.close()?;
        let b = Arc::clone(&self.backend);
        self.worker.submit(move || b.rollback()).await??;
        info!(worker_id = %self.worker.worker_id(), cause = %cause, "Batch transaction rolled back");
        Ok(())
    }

    /// Flip to closed before the terminal unit is queued, so a cancelled wait
    /// does not queue a second terminal operation from `Drop`.
    fn close(&mut self) -> std::result::Result<(), TransactionError> {
        if self.state != TransactionState::Open {
            return Err(TransactionError::Closed);
        }
        self.state = TransactionState::Closed;
        Ok(())
    }
}

impl Drop for TransactionHandle<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open {
            warn!(worker_id = %self.worker.worker_id(), "Transaction dropped while open, rolling back");
            let b = Arc::clone(&self.backend);
            let queued = self.worker.submit_detached(move || {
                if let Err(e) = b.rollback() {
                    warn!(error = %e, "Rollback on drop failed");
                }
            });
            if let Err(e) = queued {
                warn!(error = %e, "Could not queue rollback on drop");
            }
        }
    }
}
