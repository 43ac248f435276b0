//! Execution context middleware
//!
//! Runs every HTTP request inside its own root [`ExecutionContext`]. Bulk
//! calls fork their dedicated context from it, so a pinned worker is only
//! visible to the batch that pinned it.

use crate::core::pool::ExecutionContext;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use futures::future::{Ready, ready};
use std::future::Future;
use std::pin::Pin;
use tracing::trace;

pub struct ExecutionContextMiddleware;

impl<S, B> Transform<S, ServiceRequest> for ExecutionContextMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = ExecutionContextMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ExecutionContextMiddlewareService { service }))
    }
}

pub struct ExecutionContextMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ExecutionContextMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let context = ExecutionContext::root();
        trace!(context = %context.id(), path = %req.path(), "Request context opened");

        let fut = self.service.call(req);
        Box::pin(context.scope(fut))
    }
}
