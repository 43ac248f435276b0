//! Logical execution contexts
//!
//! A context is the identity under which a pinned worker is visible. It is a
//! tokio task-local, so it follows one request (or one batch) through every
//! `.await` on that task, and is *not* inherited by work spawned onto other
//! tasks.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_CONTEXT: ExecutionContext;
}

/// Identity of a logical execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A logical execution context: its own id plus the root it descends from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    id: ContextId,
    root: ContextId,
}

impl ExecutionContext {
    /// Create a fresh root context
    pub fn root() -> Self {
        let id = ContextId::next();
        Self { id, root: id }
    }

    /// Create a child context sharing this context's root
    pub fn child(&self) -> Self {
        Self {
            id: ContextId::next(),
            root: self.root,
        }
    }

    /// The context the calling task is running in, if any
    pub fn current() -> Option<Self> {
        CURRENT_CONTEXT.try_with(|ctx| *ctx).ok()
    }

    /// A child of the current context, or a fresh root when there is none
    pub fn fork() -> Self {
        Self::current()
            .map(|ctx| ctx.child())
            .unwrap_or_else(Self::root)
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn root_id(&self) -> ContextId {
        self.root
    }

    /// Run `fut` with this context as the current one
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_CONTEXT.scope(self, fut).await
    }
}
