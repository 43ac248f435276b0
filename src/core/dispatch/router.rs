//! Application router
//!
//! Matches `(method, path)` against registered routes and runs the matching
//! synchronous handler on the worker pool. Each handler runs in its own
//! transaction scope on the thread that executes it: a savepoint when that
//! thread already has a transaction open, a transaction of its own otherwise.

use super::entrypoint::{HostEntrypoint, RequestBody, ResponseEvent, ResponseSink, SubRequest};
use super::handler::{Handler, HandlerError, HandlerRequest, HandlerResponse};
use crate::core::pool::WorkerPool;
use crate::core::transaction::TransactionBackend;
use crate::utils::error::Result;
use actix_web::http::Method;
use async_trait::async_trait;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn matches(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if self.segments.len() != path.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}

enum Resolved {
    Found(Handler, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .into_iter()
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

/// Route table of synchronous handlers
pub struct AppRouter {
    routes: Vec<Route>,
    pool: WorkerPool,
    backend: Arc<dyn TransactionBackend>,
}

impl std::fmt::Debug for AppRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self
            .routes
            .iter()
            .map(|r| format!("{} {}", r.method, r.pattern))
            .collect();
        f.debug_struct("AppRouter").field("routes", &routes).finish()
    }
}

impl AppRouter {
    pub fn new(pool: WorkerPool, backend: Arc<dyn TransactionBackend>) -> Self {
        Self {
            routes: Vec::new(),
            pool,
            backend,
        }
    }

    /// Register a handler. `{name}` segments capture path parameters;
    /// trailing slashes are ignored when matching.
    pub fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerRequest) -> std::result::Result<HandlerResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        debug!(%method, pattern, "Registering route");
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn resolve(&self, method: &Method, path: &str) -> Resolved {
        let parts = split_path(path);
        let mut path_known = false;
        for route in &self.routes {
            if let Some(params) = route.matches(&parts) {
                if route.method == *method {
                    return Resolved::Found(Arc::clone(&route.handler), params);
                }
                path_known = true;
            }
        }
        if path_known {
            Resolved::MethodNotAllowed
        } else {
            Resolved::NotFound
        }
    }
}

/// Run a handler inside its own transaction scope on the calling thread
fn run_in_scope(
    backend: &dyn TransactionBackend,
    handler: &Handler,
    request: HandlerRequest,
) -> HandlerResponse {
    if let Err(e) = backend.begin() {
        warn!(error = %e, path = %request.path, "Could not open request scope");
        return HandlerError::from(e).into_response();
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(request)));
    match outcome {
        Ok(Ok(response)) => match backend.commit() {
            Ok(()) => response,
            // The handler already reported a failure; keep its response
            Err(e) if response.status >= 400 => {
                debug!(error = %e, status = response.status, "Failed request scope discarded");
                response
            }
            Err(e) => {
                error!(error = %e, "Commit of request scope failed");
                HandlerError::from(e).into_response()
            }
        },
        Ok(Err(err)) => {
            if let Err(e) = backend.rollback() {
                warn!(error = %e, "Rollback of request scope failed");
            }
            if let HandlerError::Internal(detail) = &err {
                error!(detail = %detail, "Handler failed");
            }
            err.into_response()
        }
        Err(_) => {
            if let Err(e) = backend.rollback() {
                warn!(error = %e, "Rollback after handler panic failed");
            }
            error!("Handler panicked");
            HandlerError::Internal("handler panicked".to_string()).into_response()
        }
    }
}

#[async_trait]
impl HostEntrypoint for AppRouter {
    async fn call(
        &self,
        request: SubRequest,
        mut body: RequestBody,
        sink: &mut dyn ResponseSink,
    ) -> Result<()> {
        let response = match self.resolve(&request.method, &request.path) {
            Resolved::Found(handler, params) => {
                let handler_request = HandlerRequest {
                    query: url::form_urlencoded::parse(request.query.as_bytes())
                        .into_owned()
                        .collect(),
                    method: request.method.clone(),
                    path: request.path.clone(),
                    params,
                    headers: request.headers,
                    body: body.read_to_end(),
                };
                let backend = Arc::clone(&self.backend);
                self.pool
                    .run_blocking(move || run_in_scope(backend.as_ref(), &handler, handler_request))
                    .await?
            }
            Resolved::MethodNotAllowed => HandlerError::MethodNotAllowed.into_response(),
            Resolved::NotFound => {
                HandlerError::NotFound(format!("no route for {}", request.path)).into_response()
            }
        };

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "Request handled"
        );

        sink.send(ResponseEvent::Start {
            status: response.status,
            headers: response.headers,
        })?;
        sink.send(ResponseEvent::Body {
            body: response.body,
            more: false,
        })?;
        Ok(())
    }
}
