//! Process-wide worker pool
//!
//! Runs blocking units of work on OS threads without stalling the async
//! scheduler. Worker accounting covers every live thread, shared and pinned
//! alike, against a single `max_workers` capacity.

use super::affinity::{AffinityRegistry, IdleWorkers};
use super::worker::{Worker, WorkerId, WorkerKind, await_completion};
use crate::config::PoolConfig;
use crate::utils::error::{GatewayError, Result};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Snapshot of pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Live worker threads (shared and pinned)
    pub live: usize,
    /// Shared workers sitting in the idle queue
    pub idle: usize,
    /// Workers currently pinned to an execution context
    pub pinned: usize,
    /// Maximum number of live workers
    pub capacity: usize,
}

pub(crate) struct PoolShared {
    max_workers: usize,
    idle_timeout: Duration,
    thread_name_prefix: String,
    next_worker_id: AtomicU64,
    live: AtomicUsize,
    workers: DashMap<WorkerId, Arc<Worker>>,
    pub(crate) affinity: Arc<AffinityRegistry>,
    pub(crate) idle: IdleWorkers,
    available: Notify,
}

impl PoolShared {
    /// Claim one capacity slot if any is left
    fn reserve_slot(&self) -> bool {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.max_workers).then_some(live + 1)
            })
            .is_ok()
    }

    fn free_slot(&self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.available.notify_waiters();
    }

    /// Start a worker on an already reserved slot
    fn start_worker(self: &Arc<Self>, kind: WorkerKind) -> Result<Arc<Worker>> {
        let id = WorkerId(self.next_worker_id.fetch_add(1, Ordering::Relaxed));
        let name = format!("{}-{}", self.thread_name_prefix, id.0);

        match Worker::start(id, kind, name, Arc::downgrade(self)) {
            Ok(worker) => {
                self.workers.insert(id, Arc::clone(&worker));
                Ok(worker)
            }
            Err(e) => {
                self.free_slot();
                Err(GatewayError::pool_exhausted(format!(
                    "failed to start {} worker thread: {}",
                    kind, e
                )))
            }
        }
    }

    /// Called by a shared worker after each unit of work
    pub(crate) fn return_idle(&self, worker: Arc<Worker>) {
        self.idle.push(worker);
        self.available.notify_waiters();
    }

    /// Called by a worker thread on its way out
    pub(crate) fn retire(&self, worker: &Worker) {
        self.workers.remove(&worker.id());
        if worker.release_slot() {
            self.free_slot();
        }
    }

    fn prune_idle(&self) {
        let expired = self.idle.drain_expired(self.idle_timeout, Instant::now());
        for worker in expired {
            debug!(worker_id = %worker.id(), "Reaping idle worker");
            worker.stop();
        }
    }

    /// Pick a worker for a dispatch: pinned, idle, or freshly started
    fn try_checkout(self: &Arc<Self>) -> Result<Option<Arc<Worker>>> {
        self.prune_idle();

        while let Some(worker) = self.idle.pop() {
            if !worker.is_stopping() {
                return Ok(Some(worker));
            }
            // A pinned worker keeps coming back from `pop` until it is unpinned
            if worker.is_pinned() {
                return Err(GatewayError::worker_unavailable(format!(
                    "pinned {} is stopping",
                    worker.id()
                )));
            }
        }

        if self.reserve_slot() {
            return self.start_worker(WorkerKind::Shared).map(Some);
        }
        Ok(None)
    }

    /// Start a pinned worker, reclaiming an idle shared worker's slot when
    /// the pool is at capacity.
    pub(crate) fn start_pinned(self: &Arc<Self>) -> Result<Arc<Worker>> {
        if self.reserve_slot() {
            return self.start_worker(WorkerKind::Pinned);
        }

        while let Some(victim) = self.idle.take_oldest() {
            if victim.release_slot() {
                debug!(worker_id = %victim.id(), "Reclaiming idle worker slot for a pinned worker");
                victim.stop();
                return self.start_worker(WorkerKind::Pinned);
            }
        }

        let live = self.live.load(Ordering::Acquire);
        warn!(live, capacity = self.max_workers, "No worker available for a dedicated batch");
        Err(GatewayError::pool_exhausted(format!(
            "{} of {} workers busy",
            live, self.max_workers
        )))
    }
}

/// Cloneable handle to the process-wide worker pool
#[derive(Clone)]
pub struct WorkerPool {
    pub(crate) shared: Arc<PoolShared>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("stats", &self.stats()).finish()
    }
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Self {
        info!(
            max_workers = config.max_workers,
            idle_timeout_secs = config.idle_timeout_secs,
            "Creating worker pool"
        );
        let affinity = Arc::new(AffinityRegistry::new());
        let shared = Arc::new(PoolShared {
            max_workers: config.max_workers,
            idle_timeout: config.idle_timeout(),
            thread_name_prefix: config.thread_name_prefix.clone(),
            next_worker_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
            workers: DashMap::new(),
            idle: IdleWorkers::new(Arc::clone(&affinity)),
            affinity,
            available: Notify::new(),
        });
        Self { shared }
    }

    /// Run a blocking unit of work on a worker thread.
    ///
    /// Inside an execution context that has a pinned worker this always runs
    /// on that worker; otherwise any idle worker is used, a new one is
    /// started, or the call waits for capacity.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (worker_id, receiver) = loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(worker) = self.shared.try_checkout()? {
                break (worker.id(), worker.dispatch(f)?);
            }
            notified.await;
        };
        await_completion(worker_id, receiver).await
    }

    /// The worker-affinity registry
    pub fn affinity(&self) -> &AffinityRegistry {
        &self.shared.affinity
    }

    /// The affinity-aware idle queue
    pub fn idle_workers(&self) -> &IdleWorkers {
        &self.shared.idle
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.shared.live.load(Ordering::Acquire),
            idle: self.shared.idle.len(),
            pinned: self.shared.affinity.len(),
            capacity: self.shared.max_workers,
        }
    }

    /// Number of live worker threads currently registered
    pub fn worker_count(&self) -> usize {
        self.shared.workers.len()
    }

    /// Stop every idle shared worker. Busy and pinned workers finish on their own.
    pub fn shutdown(&self) {
        let idle = self.shared.idle.drain_all();
        info!(idle = idle.len(), "Shutting down worker pool");
        for worker in idle {
            worker.stop();
        }
    }
}
