//! Worker pool integration tests
//!
//! Worker affinity and the dedicated worker lifecycle as seen through the
//! public API, including their interaction with bulk calls.

#[cfg(test)]
mod tests {
    use crate::common::fixtures::PARENTS;
    use crate::common::{ParentFactory, TestGateway};
    use bulk_rs::config::PoolConfig;
    use bulk_rs::{BulkRequestItem, ExecutionContext, GatewayError, PinnedWorker, WorkerPool};
    use std::thread::ThreadId;
    use std::time::Duration;

    fn pool(max_workers: usize) -> WorkerPool {
        WorkerPool::new(&PoolConfig {
            max_workers,
            ..PoolConfig::default()
        })
    }

    async fn thread_of(pool: &WorkerPool) -> ThreadId {
        pool.run_blocking(|| std::thread::current().id()).await.unwrap()
    }

    async fn wait_until_unpinned(pool: &WorkerPool) {
        for _ in 0..100 {
            if pool.stats().pinned == 0 && pool.stats().live <= pool.stats().idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pool did not settle: {:?}", pool.stats());
    }

    // ==================== Affinity ====================

    #[tokio::test]
    async fn test_pinned_worker_is_private_to_its_context() {
        let pool = pool(4);
        let owner = ExecutionContext::root();
        let pinned = PinnedWorker::acquire(&pool, owner).unwrap();
        let pinned_thread = pinned.submit(|| std::thread::current().id()).await.unwrap();

        let inside = owner.scope(thread_of(&pool)).await;
        assert_eq!(inside, pinned_thread);

        // Neither an unrelated context nor a child of the owner sees the pin
        let stranger = ExecutionContext::root().scope(thread_of(&pool)).await;
        assert_ne!(stranger, pinned_thread);
        let child = owner.child().scope(thread_of(&pool)).await;
        assert_ne!(child, pinned_thread);

        pinned.release();
    }

    #[tokio::test]
    async fn test_concurrent_contexts_get_distinct_workers() {
        let pool = pool(4);
        let a = ExecutionContext::root();
        let b = ExecutionContext::root();
        let pinned_a = PinnedWorker::acquire(&pool, a).unwrap();
        let pinned_b = PinnedWorker::acquire(&pool, b).unwrap();
        assert_ne!(pinned_a.worker_id(), pinned_b.worker_id());

        let (seen_a, seen_b) = tokio::join!(a.scope(thread_of(&pool)), b.scope(thread_of(&pool)));
        assert_ne!(seen_a, seen_b);
        assert_eq!(pool.stats().pinned, 2);

        pinned_a.release();
        pinned_b.release();
        assert_eq!(pool.stats().pinned, 0);
    }

    #[tokio::test]
    async fn test_shared_dispatch_reuses_idle_workers() {
        let pool = pool(4);
        let first = thread_of(&pool).await;
        // The worker rejoins the idle queue right after handing back its result
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = thread_of(&pool).await;
        assert_eq!(first, second);
        assert_eq!(pool.stats().live, 1);
    }

    // ==================== Dedicated lifecycle ====================

    #[tokio::test]
    async fn test_exhausted_pool_refuses_atomic_batch() {
        let gateway = TestGateway::with_workers(1);
        let blocker = PinnedWorker::acquire(&gateway.pool, ExecutionContext::root()).unwrap();

        let item = || BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create());
        let result = gateway.orchestrator.execute(vec![item()], true, &[]).await;
        assert!(matches!(result, Err(GatewayError::PoolExhausted(_))));
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 0);

        blocker.release();
        wait_until_unpinned(&gateway.pool).await;

        let outcome = gateway.bulk(vec![item()], true).await;
        assert_eq!(outcome.status, 200);
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_atomic_batch_releases_its_worker() {
        let gateway = TestGateway::with_workers(2);
        for _ in 0..3 {
            let outcome = gateway
                .bulk(
                    vec![BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create())],
                    true,
                )
                .await;
            assert!(outcome.is_success());
            assert_eq!(gateway.pool.stats().pinned, 0);
        }
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 3);
        assert_eq!(gateway.db.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_atomic_batches_are_isolated() {
        let gateway = TestGateway::new();
        let batch = |failing: bool| {
            let mut items: Vec<BulkRequestItem> = (0..3)
                .map(|_| BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create()))
                .collect();
            if failing {
                items.push(BulkRequestItem::new("GET", &format!("{}missing/", PARENTS)));
            }
            items
        };

        let (committed, rolled_back) = tokio::join!(
            gateway.orchestrator.execute(batch(false), true, &[]),
            gateway.orchestrator.execute(batch(true), true, &[]),
        );

        assert_eq!(committed.unwrap().status, 200);
        assert_eq!(rolled_back.unwrap().status, 400);
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 3);
        assert_eq!(gateway.pool.stats().pinned, 0);
    }

    #[tokio::test]
    async fn test_pooled_batch_runs_beside_a_pinned_worker() {
        let gateway = TestGateway::with_workers(2);
        let blocker = PinnedWorker::acquire(&gateway.pool, ExecutionContext::root()).unwrap();

        let outcome = gateway
            .bulk(
                vec![BulkRequestItem::new("POST", PARENTS).with_body(ParentFactory::create())],
                false,
            )
            .await;
        assert_eq!(outcome.items[0].status, 201);
        assert_eq!(gateway.pool.stats().pinned, 1);
        assert_eq!(gateway.db.count("parent_entity").unwrap(), 1);

        blocker.release();
    }
}
