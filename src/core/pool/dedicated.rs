//! Dedicated worker lifecycle
//!
//! A [`PinnedWorker`] reserves one worker thread for a single owner. While it
//! lives, every blocking dispatch made from its execution context lands on
//! that thread, and no unrelated task can be scheduled there. Dropping it
//! (or calling [`PinnedWorker::release`]) unregisters the pin and stops the
//! thread once its queue is drained.

use super::context::ExecutionContext;
use super::pool::{PoolShared, WorkerPool};
use super::worker::{Worker, WorkerId, await_completion};
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PinnedWorker {
    worker: Arc<Worker>,
    context: ExecutionContext,
    pool: Arc<PoolShared>,
    released: bool,
}

impl std::fmt::Debug for PinnedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedWorker")
            .field("worker", &self.worker.id())
            .field("context", &self.context.id())
            .field("released", &self.released)
            .finish()
    }
}

impl PinnedWorker {
    /// Start a worker and pin it to `context`.
    ///
    /// Fails with `GatewayError::PoolExhausted` when no worker can be started.
    pub fn acquire(pool: &WorkerPool, context: ExecutionContext) -> Result<Self> {
        let worker = pool.shared.start_pinned()?;

        if let Err(e) = pool.shared.affinity.pin(context.id(), Arc::clone(&worker)) {
            worker.stop();
            return Err(e);
        }

        info!(
            worker_id = %worker.id(),
            context_id = %context.id(),
            root_context_id = %context.root_id(),
            "Dedicated worker acquired"
        );

        Ok(Self {
            worker,
            context,
            pool: Arc::clone(&pool.shared),
            released: false,
        })
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker.id()
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Run one unit of work on the pinned thread and wait for it.
    ///
    /// If the caller stops waiting, the unit still runs to completion and its
    /// result is discarded.
    pub async fn submit<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let receiver = self.worker.dispatch(f)?;
        await_completion(self.worker.id(), receiver).await
    }

    /// Queue a unit of work without waiting for it
    pub fn submit_detached<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.worker.dispatch(f).map(drop)
    }

    /// Unpin and stop the worker after its queue drains
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.pool.affinity.unpin(self.context.id());
        self.worker.stop();
        debug!(worker_id = %self.worker.id(), context_id = %self.context.id(), "Dedicated worker released");
    }
}

impl Drop for PinnedWorker {
    fn drop(&mut self) {
        if !self.released {
            warn!(worker_id = %self.worker.id(), "Dedicated worker released on drop");
            self.release_inner();
        }
    }
}
