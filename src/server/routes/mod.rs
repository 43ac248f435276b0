//! HTTP route modules
//!
//! - `health`: liveness and pool statistics
//! - `bulk`: the bulk endpoint
//! - `forward`: every other path, handed to the application router

pub mod bulk;
pub mod forward;
pub mod health;

use actix_web::HttpRequest;

/// Request headers as `(name, value)` pairs; values that are not visible
/// ASCII are skipped
pub(crate) fn header_pairs(req: &HttpRequest) -> Vec<(String, String)> {
    req.headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
