//! Sample resources served by the gateway binary
//!
//! A small JSON:API resource set backed by [`MemoryDatabase`], used to
//! exercise bulk calls end to end.

pub mod entity;

pub use entity::{API_PREFIX, CHILD_ENTITY, PARENT_ENTITY, Resource};

use crate::core::dispatch::AppRouter;
use crate::storage::MemoryDatabase;
use std::sync::Arc;

/// Create the sample tables and register their routes
pub fn register(router: &mut AppRouter, db: &Arc<MemoryDatabase>) {
    for resource in [&PARENT_ENTITY, &CHILD_ENTITY] {
        resource.register(router, db);
    }
}
