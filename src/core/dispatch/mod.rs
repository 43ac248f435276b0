//! Request dispatch
//!
//! [`HostEntrypoint`] is the contract the bulk orchestrator drives; [`AppRouter`]
//! is the pipeline behind it, a table of blocking handlers executed on the
//! worker pool.

mod entrypoint;
mod handler;
mod router;

pub use entrypoint::{HostEntrypoint, RequestBody, ResponseEvent, ResponseSink, SubRequest};
pub use handler::{
    FieldError, Handler, HandlerError, HandlerRequest, HandlerResponse, JSON_CONTENT_TYPE,
};
pub use router::AppRouter;
