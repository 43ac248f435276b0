//! Worker affinity
//!
//! [`IdleWorkers`] is the pool's idle-worker queue with one twist: when a
//! pinned worker is registered for the caller's execution context, every
//! selection returns that worker and the real queue is left untouched.
//! Code that knows nothing about pinning keeps getting ordinary idle workers.

use super::context::{ContextId, ExecutionContext};
use super::worker::Worker;
use crate::utils::error::{GatewayError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Context-scoped table of pinned workers
#[derive(Debug, Default)]
pub struct AffinityRegistry {
    pins: DashMap<ContextId, Arc<Worker>>,
}

impl AffinityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `worker` the selection for everything running under `context`
    pub fn pin(&self, context: ContextId, worker: Arc<Worker>) -> Result<()> {
        match self.pins.entry(context) {
            Entry::Occupied(existing) => Err(GatewayError::internal(format!(
                "{} already has {} pinned",
                context,
                existing.get().id()
            ))),
            Entry::Vacant(slot) => {
                debug!(context_id = %context, worker_id = %worker.id(), "Worker pinned");
                slot.insert(worker);
                Ok(())
            }
        }
    }

    pub fn unpin(&self, context: ContextId) -> Option<Arc<Worker>> {
        let removed = self.pins.remove(&context).map(|(_, worker)| worker);
        if let Some(worker) = &removed {
            debug!(context_id = %context, worker_id = %worker.id(), "Worker unpinned");
        }
        removed
    }

    pub fn pinned_for(&self, context: ContextId) -> Option<Arc<Worker>> {
        self.pins.get(&context).map(|entry| Arc::clone(entry.value()))
    }

    /// The worker pinned for the calling task's context, if any
    pub fn current(&self) -> Option<Arc<Worker>> {
        let context = ExecutionContext::current()?;
        self.pinned_for(context.id())
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

/// Idle-worker queue consulted by the pool's dispatch path
#[derive(Debug)]
pub struct IdleWorkers {
    queue: Mutex<VecDeque<Arc<Worker>>>,
    affinity: Arc<AffinityRegistry>,
}

impl IdleWorkers {
    pub fn new(affinity: Arc<AffinityRegistry>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            affinity,
        }
    }

    /// Take a worker for the caller: its pinned worker, else the most
    /// recently idled shared worker.
    pub fn pop(&self) -> Option<Arc<Worker>> {
        if let Some(pinned) = self.affinity.current() {
            return Some(pinned);
        }
        self.queue.lock().pop_back()
    }

    /// Look at the worker `pop` would consider oldest without removing it
    pub fn peek_oldest(&self) -> Option<Arc<Worker>> {
        if let Some(pinned) = self.affinity.current() {
            return Some(pinned);
        }
        self.queue.lock().front().cloned()
    }

    /// Whether `pop` would return a worker
    pub fn is_available(&self) -> bool {
        self.affinity.current().is_some() || !self.queue.lock().is_empty()
    }

    /// Number of shared workers actually sitting in the queue
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, worker: Arc<Worker>) {
        debug_assert!(!worker.is_pinned());
        worker.mark_idle();
        self.queue.lock().push_back(worker);
    }

    /// Remove shared workers idle for longer than `timeout`, oldest first.
    ///
    /// Does nothing for a caller with a pinned worker.
    pub(crate) fn drain_expired(&self, timeout: Duration, now: Instant) -> Vec<Arc<Worker>> {
        if self.affinity.current().is_some() {
            return Vec::new();
        }
        let mut queue = self.queue.lock();
        let mut expired = Vec::new();
        while let Some(oldest) = queue.front() {
            if oldest.idle_for(now) < timeout {
                break;
            }
            if let Some(worker) = queue.pop_front() {
                expired.push(worker);
            }
        }
        expired
    }

    /// Remove the oldest idle shared worker regardless of its age
    pub(crate) fn take_oldest(&self) -> Option<Arc<Worker>> {
        self.queue.lock().pop_front()
    }

    pub(crate) fn drain_all(&self) -> Vec<Arc<Worker>> {
        self.queue.lock().drain(..).collect()
    }
}
