//! Test fixtures and data factories
//!
//! Provides a wired gateway stack and factories for sample resource
//! documents. Everything is real: the pool starts real threads and the
//! database is the in-memory store the gateway binary uses.

use bulk_rs::config::PoolConfig;
use bulk_rs::core::bulk::{BulkOrchestrator, BulkOutcome, BulkRequestItem};
use bulk_rs::core::dispatch::AppRouter;
use bulk_rs::core::pool::WorkerPool;
use bulk_rs::sample;
use bulk_rs::storage::MemoryDatabase;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

pub const PARENTS: &str = "/api/v1/entity/parent_entity/";
pub const CHILDREN: &str = "/api/v1/entity/child_entity/";

/// Pool, database, router and orchestrator wired the way the server wires them
pub struct TestGateway {
    pub pool: WorkerPool,
    pub db: Arc<MemoryDatabase>,
    pub orchestrator: BulkOrchestrator,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_workers(8)
    }

    pub fn with_workers(max_workers: usize) -> Self {
        let pool = WorkerPool::new(&PoolConfig {
            max_workers,
            ..PoolConfig::default()
        });
        let db = Arc::new(MemoryDatabase::new());
        let mut router = AppRouter::new(pool.clone(), db.clone());
        sample::register(&mut router, &db);
        let orchestrator = BulkOrchestrator::new(Arc::new(router), pool.clone(), db.clone());
        Self {
            pool,
            db,
            orchestrator,
        }
    }

    /// Run a batch, panicking if the call itself fails
    pub async fn bulk(&self, items: Vec<BulkRequestItem>, atomic: bool) -> BulkOutcome {
        match self.orchestrator.execute(items, atomic, &[]).await {
            Ok(outcome) => outcome,
            Err(e) => panic!("bulk call failed: {}", e),
        }
    }

    /// Fetch one resource outside any batch
    pub async fn fetch(&self, endpoint: &str) -> (u16, Value) {
        let outcome = self.bulk(vec![BulkRequestItem::new("GET", endpoint)], false).await;
        let item = &outcome.items[0];
        (item.status, item.response.as_json().cloned().unwrap_or(Value::Null))
    }

    /// Create `count` parents and return their ids
    pub async fn seed_parents(&self, count: usize) -> Vec<String> {
        let parents: Vec<Value> = (0..count).map(|_| ParentFactory::create()).collect();
        let ids = parents
            .iter()
            .map(|doc| doc["data"]["id"].as_str().unwrap_or_default().to_string())
            .collect();
        let items = parents
            .into_iter()
            .map(|doc| BulkRequestItem::new("POST", PARENTS).with_body(doc))
            .collect();
        let outcome = self.bulk(items, true).await;
        assert!(outcome.is_success(), "seeding parents failed: {:?}", outcome.items);
        ids
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Factory for `entity.parent_entity` documents
pub struct ParentFactory;

impl ParentFactory {
    /// A complete, valid parent with a client-chosen id
    pub fn create() -> Value {
        Self::named(&format!("Parent {}", short_id()))
    }

    pub fn named(name: &str) -> Value {
        json!({
            "data": {
                "id": Uuid::new_v4().to_string(),
                "type": "entity.parent_entity",
                "bs:action": "add",
                "attributes": {
                    "name": name,
                    "description": "Parent test description",
                    "is_active": true,
                    "price": "100.25",
                    "dt_approved": "2024-01-14T17:54:12Z",
                },
            }
        })
    }

    /// A PATCH document that renames parent `id`
    pub fn rename(id: &str, name: &str) -> Value {
        json!({
            "data": {
                "id": id,
                "type": "entity.parent_entity",
                "bs:action": "change",
                "attributes": { "name": name },
            }
        })
    }
}

/// Factory for `entity.child_entity` documents
pub struct ChildFactory;

impl ChildFactory {
    pub fn create(is_active: bool, parents: &[String]) -> Value {
        let data: Vec<Value> = parents
            .iter()
            .map(|id| json!({ "id": id, "type": "entity.parent_entity" }))
            .collect();
        json!({
            "data": {
                "type": "entity.child_entity",
                "bs:action": "add",
                "attributes": {
                    "child_name": format!("Child {}", short_id()),
                    "child_description": "Child test description",
                    "child_is_active": is_active,
                    "child_price": "421.74",
                    "child_dt_approved": "2024-01-14T17:54:12Z",
                },
                "relationships": { "parent_entities": { "data": data } },
            }
        })
    }
}
