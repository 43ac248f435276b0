//! Response capture
//!
//! Collects the start event and every body event of one sub-request and turns
//! them into a [`BulkResponseItem`].

use super::types::{BulkResponseItem, ResponseBody};
use crate::core::dispatch::{ResponseEvent, ResponseSink};
use crate::utils::error::{GatewayError, Result};
use bytes::{Bytes, BytesMut};
use tracing::warn;

#[derive(Debug, Default)]
pub struct ResponseCapture {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: BytesMut,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }

    /// Status, headers and raw body, for callers that relay the response as is
    pub fn into_parts(self) -> Result<(u16, Vec<(String, String)>, Bytes)> {
        let status = self
            .status
            .ok_or_else(|| GatewayError::entrypoint("response finished without a start event"))?;
        Ok((status, self.headers, self.body.freeze()))
    }

    pub fn into_item(self, endpoint: impl Into<String>) -> Result<BulkResponseItem> {
        let is_json = self
            .content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        let (status, headers, body) = self.into_parts()?;
        let endpoint = endpoint.into();

        Ok(BulkResponseItem {
            response: decode_body(&endpoint, is_json, body),
            endpoint,
            status,
            headers,
        })
    }
}

fn decode_body(endpoint: &str, is_json: bool, body: Bytes) -> ResponseBody {
    if is_json {
        if body.is_empty() {
            return ResponseBody::Json(serde_json::Value::Null);
        }
        match serde_json::from_slice(&body) {
            Ok(value) => return ResponseBody::Json(value),
            Err(e) => warn!(endpoint, error = %e, "Response declared JSON but did not parse"),
        }
    }
    match String::from_utf8(body.to_vec()) {
        Ok(text) => ResponseBody::Text(text),
        Err(e) => ResponseBody::Bytes(e.into_bytes()),
    }
}

impl ResponseSink for ResponseCapture {
    fn send(&mut self, event: ResponseEvent) -> Result<()> {
        match event {
            ResponseEvent::Start { status, headers } => {
                if self.status.is_some() {
                    return Err(GatewayError::entrypoint("response started twice"));
                }
                self.status = Some(status);
                self.headers = headers;
            }
            ResponseEvent::Body { body, .. } => {
                if self.status.is_none() {
                    return Err(GatewayError::entrypoint("response body before start event"));
                }
                self.body.extend_from_slice(&body);
            }
        }
        Ok(())
    }
}
