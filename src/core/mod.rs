//! Core functionality for the gateway
//!
//! Worker pool and affinity, the transaction protocol, request dispatch and
//! bulk orchestration.

pub mod bulk;
pub mod dispatch;
pub mod pool;
pub mod transaction;
