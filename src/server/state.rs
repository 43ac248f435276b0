//! Application state shared across HTTP handlers

use crate::config::Config;
use crate::core::bulk::BulkOrchestrator;
use crate::core::dispatch::AppRouter;
use crate::core::pool::WorkerPool;
use crate::storage::MemoryDatabase;
use std::sync::Arc;

/// HTTP server state shared across handlers
///
/// The worker pool, database, router and orchestrator are process-wide: every
/// HTTP worker thread sees the same instances.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (shared read-only)
    pub config: Arc<Config>,
    /// Worker pool running blocking handlers
    pub pool: WorkerPool,
    /// Database behind the sample resources
    pub db: Arc<MemoryDatabase>,
    /// Route table for everything that is not a gateway endpoint
    pub router: Arc<AppRouter>,
    /// Bulk call executor driving `router`
    pub orchestrator: BulkOrchestrator,
}

impl AppState {
    /// Build state with the sample resources mounted
    pub fn new(config: Config) -> Self {
        let pool = WorkerPool::new(config.pool());
        let db = Arc::new(MemoryDatabase::new());
        let mut router = AppRouter::new(pool.clone(), db.clone());
        crate::sample::register(&mut router, &db);
        Self::with_router(config, pool, db, router)
    }

    /// Build state around an existing router. `router` must run its handlers
    /// on `pool` against `db`.
    pub fn with_router(
        config: Config,
        pool: WorkerPool,
        db: Arc<MemoryDatabase>,
        router: AppRouter,
    ) -> Self {
        let router = Arc::new(router);
        let orchestrator = BulkOrchestrator::new(router.clone(), pool.clone(), db.clone());
        Self {
            config: Arc::new(config),
            pool,
            db,
            router,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool", &self.pool)
            .field("router", &self.router)
            .finish()
    }
}
