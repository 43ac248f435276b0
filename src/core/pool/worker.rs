//! Worker threads
//!
//! A worker is one OS thread draining a private FIFO queue of units of work.
//! Two variants exist: shared workers return themselves to the pool's idle
//! queue after every unit and can be reaped when idle for too long; pinned
//! workers never go back to the idle queue and are never reaped, they only
//! stop when their owner releases them.

use super::pool::PoolShared;
use crate::utils::error::{GatewayError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Worker identifier, unique per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Which teardown rules a worker follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// Returns to the idle queue after each unit, reaped after the idle timeout
    Shared,
    /// Reserved for one owner; never idle-queued, never reaped
    Pinned,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Shared => write!(f, "shared"),
            WorkerKind::Pinned => write!(f, "pinned"),
        }
    }
}

/// Handle to a worker thread
pub struct Worker {
    id: WorkerId,
    kind: WorkerKind,
    sender: Sender<Message>,
    idle_since: Mutex<Instant>,
    stopping: AtomicBool,
    /// Whether this worker still owns its capacity slot in the pool
    holds_slot: AtomicBool,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

impl Worker {
    /// Spawn the OS thread backing a new worker.
    ///
    /// The caller must already have reserved a capacity slot for it.
    pub(crate) fn start(
        id: WorkerId,
        kind: WorkerKind,
        thread_name: String,
        pool: Weak<PoolShared>,
    ) -> std::io::Result<Arc<Self>> {
        let (sender, receiver) = channel::unbounded();
        let worker = Arc::new(Self {
            id,
            kind,
            sender,
            idle_since: Mutex::new(Instant::now()),
            stopping: AtomicBool::new(false),
            holds_slot: AtomicBool::new(true),
        });

        let thread_worker = Arc::clone(&worker);
        std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || thread_worker.run(receiver, pool))?;

        debug!(worker_id = %id, kind = %kind, "Worker started");
        Ok(worker)
    }

    fn run(self: Arc<Self>, receiver: Receiver<Message>, pool: Weak<PoolShared>) {
        while let Ok(message) = receiver.recv() {
            match message {
                Message::Run(job) => {
                    job();
                    if self.kind == WorkerKind::Shared && !self.is_stopping() {
                        match pool.upgrade() {
                            Some(shared) => shared.return_idle(Arc::clone(&self)),
                            None => break,
                        }
                    }
                }
                Message::Stop => break,
            }
        }

        debug!(worker_id = %self.id, kind = %self.kind, "Worker stopped");
        if let Some(shared) = pool.upgrade() {
            shared.retire(&self);
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn is_pinned(&self) -> bool {
        self.kind == WorkerKind::Pinned
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// How long this worker has been idle. Always zero for pinned workers.
    pub fn idle_for(&self, now: Instant) -> Duration {
        match self.kind {
            WorkerKind::Pinned => Duration::ZERO,
            WorkerKind::Shared => now.saturating_duration_since(*self.idle_since.lock()),
        }
    }

    pub(crate) fn mark_idle(&self) {
        if self.kind == WorkerKind::Shared {
            *self.idle_since.lock() = Instant::now();
        }
    }

    /// Give up the capacity slot. Returns true only for the first caller.
    pub(crate) fn release_slot(&self) -> bool {
        self.holds_slot.swap(false, Ordering::AcqRel)
    }

    /// Ask the worker to exit once everything already queued has run
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!(worker_id = %self.id, "Stop requested");
        // A closed channel means the thread is already gone
        let _ = self.sender.send(Message::Stop);
    }

    /// Queue a unit of work and return the single-use completion signal.
    ///
    /// The unit runs even if the receiver is dropped; its result is then
    /// discarded.
    pub(crate) fn dispatch<F, T>(&self, f: F) -> Result<oneshot::Receiver<std::thread::Result<T>>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_stopping() {
            return Err(GatewayError::worker_unavailable(format!(
                "{} is stopping",
                self.id
            )));
        }

        let (tx, rx) = oneshot::channel();
        let worker_id = self.id;
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            if tx.send(outcome).is_err() {
                trace!(worker_id = %worker_id, "Caller went away, result discarded");
            }
        });

        self.sender
            .send(Message::Run(job))
            .map_err(|_| GatewayError::worker_unavailable(format!("{} has exited", self.id)))?;
        Ok(rx)
    }

    /// Queue a unit of work and wait for its result
    pub async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let receiver = self.dispatch(f)?;
        await_completion(self.id, receiver).await
    }
}

pub(crate) async fn await_completion<T>(
    worker_id: WorkerId,
    receiver: oneshot::Receiver<std::thread::Result<T>>,
) -> Result<T> {
    match receiver.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => {
            let message = panic_message(payload.as_ref());
            warn!(worker_id = %worker_id, panic = %message, "Unit of work panicked");
            Err(GatewayError::worker_panicked(message))
        }
        Err(_) => Err(GatewayError::worker_unavailable(format!(
            "{} dropped the completion signal",
            worker_id
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn standalone(kind: WorkerKind) -> Arc<Worker> {
        Worker::start(WorkerId(9_000), kind, "test-worker".to_string(), Weak::new()).unwrap()
    }

    #[tokio::test]
    async fn test_execute_returns_value() {
        let worker = standalone(WorkerKind::Pinned);
        let value = worker.execute(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
        worker.stop();
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_worker_survives() {
        let worker = standalone(WorkerKind::Pinned);
        let result: Result<()> = worker.execute(|| panic!("handler exploded")).await;
        assert!(matches!(result, Err(GatewayError::WorkerPanicked(msg)) if msg == "handler exploded"));

        let value = worker.execute(|| "still alive").await.unwrap();
        assert_eq!(value, "still alive");
        worker.stop();
    }

    #[tokio::test]
    async fn test_units_run_in_submission_order_on_one_thread() {
        let worker = standalone(WorkerKind::Pinned);
        let log = Arc::new(Mutex::new(Vec::new()));

        let receivers: Vec<_> = (0..10)
            .map(|i| {
                let log = Arc::clone(&log);
                worker
                    .dispatch(move || log.lock().push((i, std::thread::current().id())))
                    .unwrap()
            })
            .collect();
        for receiver in receivers {
            await_completion(worker.id(), receiver).await.unwrap();
        }

        let log = log.lock();
        let order: Vec<i32> = log.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert!(log.iter().all(|(_, thread)| *thread == log[0].1));
        worker.stop();
    }

    #[tokio::test]
    async fn test_dropped_receiver_still_runs_unit() {
        let worker = standalone(WorkerKind::Pinned);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let receiver = worker
            .dispatch(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        drop(receiver);

        // Anything queued after it observes its effect
        let c = Arc::clone(&counter);
        let seen = worker.execute(move || c.load(Ordering::SeqCst)).await.unwrap();
        assert_eq!(seen, 1);
        worker.stop();
    }

    #[tokio::test]
    async fn test_dispatch_after_stop_fails() {
        let worker = standalone(WorkerKind::Pinned);
        worker.stop();
        let result = worker.execute(|| ()).await;
        assert!(matches!(result, Err(GatewayError::WorkerUnavailable(_))));
    }

    #[test]
    fn test_pinned_worker_never_ages() {
        let worker = standalone(WorkerKind::Pinned);
        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(worker.idle_for(later), Duration::ZERO);
        worker.stop();
    }

    #[test]
    fn test_release_slot_only_once() {
        let worker = standalone(WorkerKind::Shared);
        assert!(worker.release_slot());
        assert!(!worker.release_slot());
        worker.stop();
    }
}
