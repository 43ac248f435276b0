//! HTTP middleware implementations
//!
//! - Request ID tracking
//! - Per-request execution contexts

mod context;
mod request_id;

pub use context::{ExecutionContextMiddleware, ExecutionContextMiddlewareService};
pub use request_id::{REQUEST_ID_HEADER, RequestIdMiddleware, RequestIdMiddlewareService};
