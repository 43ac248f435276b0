//! Bulk request types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

fn default_method() -> String {
    "GET".to_string()
}

/// One sub-request of a bulk call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRequestItem {
    /// Target path with optional query string, e.g. `/api/v1/entity/parent_entity/?sort=id`
    pub endpoint: String,
    /// HTTP method, case-insensitive
    #[serde(default = "default_method")]
    pub method: String,
    /// JSON body; absent is sent as `null`
    #[serde(default)]
    pub body: Option<Value>,
    /// Extra headers as `[name, value]` pairs
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl BulkRequestItem {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A captured sub-request response body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Decoded JSON, `null` for an empty JSON body
    Json(Value),
    /// Non-JSON body that is valid UTF-8
    Text(String),
    /// Anything else, carried as is
    Bytes(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of one sub-request, at the same index as its request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResponseItem {
    pub endpoint: String,
    pub status: u16,
    pub response: ResponseBody,
    pub headers: Vec<(String, String)>,
}

/// How a batch is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Independent sub-requests on the shared pool, no shared transaction
    Pooled,
    /// All sub-requests on one pinned worker inside one transaction
    Dedicated,
}

impl ExecutionMode {
    pub fn from_atomic(atomic: bool) -> Self {
        if atomic {
            ExecutionMode::Dedicated
        } else {
            ExecutionMode::Pooled
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Pooled => write!(f, "pooled"),
            ExecutionMode::Dedicated => write!(f, "dedicated"),
        }
    }
}

/// Outcome of a whole bulk call
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome {
    pub mode: ExecutionMode,
    /// 200, or 400 when a dedicated batch was rolled back
    pub status: u16,
    pub items: Vec<BulkResponseItem>,
}

impl BulkOutcome {
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}
