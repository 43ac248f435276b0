//! Bulk requests: many sub-requests in one call, optionally as one transaction

mod capture;
mod orchestrator;
mod request;
mod types;


pub use capture::ResponseCapture;
pub use orchestrator::BulkOrchestrator;
pub use request::synthesize;
pub use types::{BulkOutcome, BulkRequestItem, BulkResponseItem, ExecutionMode, ResponseBody};
