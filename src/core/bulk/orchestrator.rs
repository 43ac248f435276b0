//! Bulk orchestrator
//!
//! Runs each item of a batch through the host entrypoint in submission order.
//!
//! - `Pooled`: items run like independent calls on the shared pool. Each item's
//!   effects are final whatever happens to its siblings.
//! - `Dedicated`: a worker is pinned to a child execution context, a
//!   transaction is opened on it and every item runs on that worker inside the
//!   transaction. After every item the transaction is checkpointed. Once all
//!   items have run the batch commits, or rolls back if any item failed.

use super::capture::ResponseCapture;
use super::request::synthesize;
use super::types::{BulkOutcome, BulkRequestItem, BulkResponseItem, ExecutionMode};
use crate::core::dispatch::{HostEntrypoint, RequestBody, SubRequest};
use crate::core::pool::{ExecutionContext, PinnedWorker, WorkerPool};
use crate::core::transaction::{
    Checkpoint, Decision, RollbackCause, TransactionBackend, TransactionHandle,
};
use crate::utils::error::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type Prepared = Vec<(String, SubRequest, RequestBody)>;

/// Executes bulk calls against a host entrypoint
#[derive(Clone)]
pub struct BulkOrchestrator {
    entrypoint: Arc<dyn HostEntrypoint>,
    pool: WorkerPool,
    backend: Arc<dyn TransactionBackend>,
}

impl std::fmt::Debug for BulkOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkOrchestrator")
            .field("pool", &self.pool)
            .finish()
    }
}

impl BulkOrchestrator {
    pub fn new(
        entrypoint: Arc<dyn HostEntrypoint>,
        pool: WorkerPool,
        backend: Arc<dyn TransactionBackend>,
    ) -> Self {
        Self {
            entrypoint,
            pool,
            backend,
        }
    }

    /// Execute a batch.
    ///
    /// Every item is validated and synthesized before anything runs, so a
    /// malformed item fails the call without side effects. `outer_headers` are
    /// forwarded to every sub-request.
    pub async fn execute(
        &self,
        items: Vec<BulkRequestItem>,
        atomic: bool,
        outer_headers: &[(String, String)],
    ) -> Result<BulkOutcome> {
        let mode = ExecutionMode::from_atomic(atomic);
        let prepared = items
            .into_iter()
            .map(|item| {
                let (request, body) = synthesize(&item, outer_headers)?;
                Ok((item.endpoint, request, body))
            })
            .collect::<Result<Prepared>>()?;

        info!(mode = %mode, items = prepared.len(), "Processing bulk request");

        match mode {
            ExecutionMode::Pooled => self.run_pooled(prepared).await,
            ExecutionMode::Dedicated => {
                let context = ExecutionContext::fork();
                context.scope(self.run_dedicated(context, prepared)).await
            }
        }
    }

    async fn dispatch(
        &self,
        endpoint: String,
        request: SubRequest,
        body: RequestBody,
    ) -> Result<BulkResponseItem> {
        let mut capture = ResponseCapture::new();
        self.entrypoint.call(request, body, &mut capture).await?;
        capture.into_item(endpoint)
    }

    async fn run_pooled(&self, prepared: Prepared) -> Result<BulkOutcome> {
        let mut items = Vec::with_capacity(prepared.len());
        for (index, (endpoint, request, body)) in prepared.into_iter().enumerate() {
            let item = self.dispatch(endpoint, request, body).await?;
            debug!(index, status = item.status, "Bulk item processed");
            items.push(item);
        }

        Ok(BulkOutcome {
            mode: ExecutionMode::Pooled,
            status: 200,
            items,
        })
    }

    async fn run_dedicated(
        &self,
        context: ExecutionContext,
        prepared: Prepared,
    ) -> Result<BulkOutcome> {
        let pinned = PinnedWorker::acquire(&self.pool, context)?;
        let outcome = self.run_in_transaction(&pinned, prepared).await;
        pinned.release();
        outcome
    }

    async fn run_in_transaction(
        &self,
        pinned: &PinnedWorker,
        prepared: Prepared,
    ) -> Result<BulkOutcome> {
        let mut tx = TransactionHandle::begin(pinned, Arc::clone(&self.backend)).await?;
        let mut items = Vec::with_capacity(prepared.len());
        let mut failed = Vec::new();
        let mut recovered = Vec::new();

        for (index, (endpoint, request, body)) in prepared.into_iter().enumerate() {
            let item = match self.dispatch(endpoint, request, body).await {
                Ok(item) => item,
                Err(e) => {
                    error!(index, error = %e, "Bulk item failed to execute, aborting batch");
                    if let Err(rollback_err) =
                        tx.rollback(&RollbackCause::Aborted(e.to_string())).await
                    {
                        warn!(error = %rollback_err, "Rollback of aborted batch failed");
                    }
                    return Err(e);
                }
            };

            if tx.checkpoint().await? == Checkpoint::Recovered {
                recovered.push(index);
            }
            if item.status >= 400 {
                failed.push(index);
            }
            debug!(index, status = item.status, worker_id = %pinned.worker_id(), "Bulk item processed");
            items.push(item);
        }

        let decision = Decision::from_batch(failed, recovered);
        tx.finish(&decision).await?;

        let status = if decision.is_commit() { 200 } else { 400 };
        info!(status, items = items.len(), "Dedicated batch finished");
        Ok(BulkOutcome {
            mode: ExecutionMode::Dedicated,
            status,
            items,
        })
    }
}
