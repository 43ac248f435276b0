//! # bulk-rs
//!
//! An HTTP gateway that executes many sub-requests in one call.
//!
//! ## Features
//!
//! - **Bulk endpoint**: a JSON array of `{endpoint, method, body, headers}`
//!   items in, one `{endpoint, status, response, headers}` entry per item out
//! - **Atomic batches**: with `is_atomic=true` every item runs on one pinned
//!   worker thread inside a single database transaction, committed only if
//!   every item succeeds
//! - **Worker affinity**: a pinned worker is visible only to the execution
//!   context that pinned it; everything else keeps using the shared pool
//! - **Transaction recovery**: a transaction poisoned by a caught storage
//!   error is rolled back and reopened between items, so later items still
//!   report their own status
//!
//! ## Gateway Mode
//!
//! ```rust,no_run
//! use bulk_rs::{Config, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/gateway.yaml").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Embedding the orchestrator
//!
//! ```rust,no_run
//! use bulk_rs::config::PoolConfig;
//! use bulk_rs::core::bulk::{BulkOrchestrator, BulkRequestItem};
//! use bulk_rs::core::dispatch::AppRouter;
//! use bulk_rs::core::pool::WorkerPool;
//! use bulk_rs::storage::MemoryDatabase;
//! use std::sync::Arc;
//!
//! # async fn run() -> bulk_rs::Result<()> {
//! let pool = WorkerPool::new(&PoolConfig::default());
//! let db = Arc::new(MemoryDatabase::new());
//! let mut router = AppRouter::new(pool.clone(), db.clone());
//! bulk_rs::sample::register(&mut router, &db);
//!
//! let orchestrator = BulkOrchestrator::new(Arc::new(router), pool, db);
//! let items = vec![BulkRequestItem::new("GET", "/api/v1/entity/parent_entity/")];
//! let outcome = orchestrator.execute(items, true, &[]).await?;
//! assert_eq!(outcome.status, 200);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod sample;
pub mod server;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use core::bulk::{BulkOrchestrator, BulkOutcome, BulkRequestItem, BulkResponseItem, ExecutionMode};
pub use core::pool::{ExecutionContext, PinnedWorker, WorkerPool};
pub use core::transaction::{TransactionBackend, TransactionHandle};
pub use utils::error::{GatewayError, Result};

use tracing::info;

/// The gateway: configuration plus the HTTP server built from it
pub struct Gateway {
    config: Config,
    server: server::HttpServer,
}

impl Gateway {
    /// Create a new gateway instance
    pub fn new(config: Config) -> Result<Self> {
        info!("Creating new gateway instance");
        let server = server::ServerBuilder::new()
            .with_config(config.clone())
            .build()?;
        Ok(Self { config, server })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the gateway server
    pub async fn run(self) -> Result<()> {
        info!("Starting bulk gateway");
        info!("Configuration: {:#?}", self.config);
        self.server.start().await
    }
}

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
