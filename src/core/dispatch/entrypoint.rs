//! Host entrypoint contract
//!
//! The pipeline that executes one request. It is handed a request description,
//! a body source and a response sink, and reports the response as a start
//! event followed by one or more body events.

use crate::utils::error::Result;
use actix_web::http::Method;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

/// Description of one request to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    pub method: Method,
    /// Path without the query string
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    pub headers: Vec<(String, String)>,
}

impl SubRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: String::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Last value of a header, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Byte source for a request body
#[derive(Debug, Default, Clone)]
pub struct RequestBody {
    chunks: VecDeque<Bytes>,
}

impl RequestBody {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let mut chunks = VecDeque::new();
        chunks.push_back(bytes.into());
        Self { chunks }
    }

    /// Next chunk, or `None` once the body is exhausted
    pub fn next_chunk(&mut self) -> Option<Bytes> {
        self.chunks.pop_front()
    }

    /// Read the rest of the body into one buffer
    pub fn read_to_end(&mut self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.pop_front().unwrap_or_default(),
            _ => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = self.chunks.pop_front() {
                    buf.extend_from_slice(&chunk);
                }
                buf.freeze()
            }
        }
    }
}

/// Response events emitted by the entrypoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    Start {
        status: u16,
        headers: Vec<(String, String)>,
    },
    Body {
        body: Bytes,
        /// Whether more body events follow
        more: bool,
    },
}

/// Receiver of response events
pub trait ResponseSink: Send {
    fn send(&mut self, event: ResponseEvent) -> Result<()>;
}

/// A request pipeline that executes one request per call.
///
/// A call returns `Ok` once it has emitted a complete response, whatever its
/// status. `Err` means the pipeline itself failed and no usable response was
/// produced.
#[async_trait]
pub trait HostEntrypoint: Send + Sync {
    async fn call(
        &self,
        request: SubRequest,
        body: RequestBody,
        sink: &mut dyn ResponseSink,
    ) -> Result<()>;
}
