//! Worker pool with per-context worker affinity
//!
//! Blocking request handlers run on a pool of OS threads. Normally any idle
//! worker will do, but an atomic batch needs every one of its sub-requests on
//! the *same* thread so they can share that thread's connection and
//! transaction. The pieces:
//!
//! - [`WorkerPool`]: worker accounting, idle queue, blocking dispatch
//! - [`IdleWorkers`] / [`AffinityRegistry`]: the idle queue's affinity override
//! - [`ExecutionContext`]: the task-local identity pins are keyed by
//! - [`PinnedWorker`]: acquire / submit / release of a dedicated worker

mod affinity;
mod context;
mod dedicated;
#[allow(clippy::module_inception)]
mod pool;
mod worker;

pub use affinity::{AffinityRegistry, IdleWorkers};
pub use context::{ContextId, ExecutionContext};
pub use dedicated::PinnedWorker;
pub use pool::{PoolStats, WorkerPool};
pub use worker::{Worker, WorkerId, WorkerKind};
