//! Synchronous request handlers and their JSON:API error bodies

use crate::core::transaction::TransactionError;
use crate::storage::StorageError;
use actix_web::http::Method;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A blocking request handler
pub type Handler =
    Arc<dyn Fn(HandlerRequest) -> Result<HandlerResponse, HandlerError> + Send + Sync + 'static>;

/// Everything a handler gets to see of its request
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub method: Method,
    pub path: String,
    /// Values of `{param}` segments in the matched route
    pub params: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HandlerRequest {
    pub fn param(&self, name: &str) -> Result<&str, HandlerError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| HandlerError::BadRequest(format!("missing path parameter {}", name)))
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON. An empty body or `null` decodes as `T`'s
    /// representation of null.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
        serde_json::from_slice(body)
            .map_err(|e| HandlerError::BadRequest(format!("invalid JSON body: {}", e)))
    }
}

/// A complete response produced by a handler
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HandlerResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())],
                body: Bytes::from(body),
            },
            Err(e) => HandlerError::Internal(e.to_string()).into_response(),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain; charset=utf-8".to_string())],
            body: Bytes::from(body.into()),
        }
    }
}

/// One invalid attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    /// Machine-readable failure kind, e.g. `decimal_parsing`
    pub kind: String,
    pub detail: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

/// Handler failures, each rendered as a JSON:API error document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> u16 {
        match self {
            HandlerError::Validation(_) => 422,
            HandlerError::NotFound(_) => 404,
            HandlerError::Conflict(_) => 409,
            HandlerError::BadRequest(_) => 400,
            HandlerError::MethodNotAllowed => 405,
            HandlerError::Internal(_) => 500,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            HandlerError::Validation(_) => "ERR_VALIDATE",
            HandlerError::NotFound(_) => "ERR_NOT_FOUND",
            HandlerError::Conflict(_) => "ERR_CONFLICT",
            HandlerError::BadRequest(_) => "ERR_BAD_REQUEST",
            HandlerError::MethodNotAllowed => "ERR_METHOD_NOT_ALLOWED",
            HandlerError::Internal(_) => "ERR_INTERNAL",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            HandlerError::Validation(_) => "Validation error",
            HandlerError::NotFound(_) => "Not found",
            HandlerError::Conflict(_) => "Conflict",
            HandlerError::BadRequest(_) => "Bad request",
            HandlerError::MethodNotAllowed => "Method not allowed",
            HandlerError::Internal(_) => "Internal server error",
        }
    }

    /// `{"errors": [...]}` document for this error
    pub fn to_document(&self) -> Value {
        let status = self.status();
        let errors: Vec<Value> = match self {
            HandlerError::Validation(fields) => fields
                .iter()
                .map(|f| {
                    json!({
                        "status": status,
                        "code": self.code(),
                        "title": f.kind,
                        "detail": f.detail,
                        "source": { "pointer": format!("/attributes/{}", f.field) },
                    })
                })
                .collect(),
            // Internal details stay in the logs
            HandlerError::Internal(_) => vec![json!({
                "status": status,
                "code": self.code(),
                "title": self.title(),
            })],
            other => vec![json!({
                "status": status,
                "code": other.code(),
                "title": other.title(),
                "detail": other.to_string(),
            })],
        };
        json!({ "errors": errors })
    }

    pub fn into_response(self) -> HandlerResponse {
        HandlerResponse::json(self.status(), &self.to_document())
    }
}

impl From<StorageError> for HandlerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => HandlerError::NotFound(err.to_string()),
            StorageError::UniqueViolation { .. } => HandlerError::Conflict(err.to_string()),
            StorageError::InvalidRow(msg) => HandlerError::BadRequest(msg),
            other => HandlerError::Internal(other.to_string()),
        }
    }
}

impl From<TransactionError> for HandlerError {
    fn from(err: TransactionError) -> Self {
        HandlerError::Internal(err.to_string())
    }
}
