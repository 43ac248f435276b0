//! Bulk endpoint
//!
//! `POST <bulk path>?is_atomic=<bool>` with a JSON array of
//! `{endpoint, method, body, headers}` items. Responds with one
//! `{endpoint, status, response, headers}` entry per item, in order. An
//! atomic batch answers 400 when it was rolled back, 200 otherwise.

use super::header_pairs;
use crate::core::bulk::BulkRequestItem;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use tracing::info;

/// Mount the bulk endpoint at `path`
pub fn configure_routes(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.route(path, web::post().to(bulk));
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkQuery {
    /// Run the batch in one transaction; defaults to `bulk.default_atomic`
    pub is_atomic: Option<bool>,
}

pub async fn bulk(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<BulkQuery>,
    items: web::Json<Vec<BulkRequestItem>>,
) -> Result<HttpResponse> {
    let atomic = query
        .is_atomic
        .unwrap_or(state.config.bulk().default_atomic);
    let outer_headers = header_pairs(&req);

    let outcome = state
        .orchestrator
        .execute(items.into_inner(), atomic, &outer_headers)
        .await?;

    info!(
        mode = %outcome.mode,
        status = outcome.status,
        items = outcome.items.len(),
        "Bulk request completed"
    );

    let status = StatusCode::from_u16(outcome.status)
        .map_err(|e| GatewayError::internal(format!("invalid bulk status: {}", e)))?;
    Ok(HttpResponse::build(status).json(&outcome.items))
}
