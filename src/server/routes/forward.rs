//! Fallback service: hands any request the gateway does not route itself to
//! the application router, the same entrypoint bulk items go through.

use super::header_pairs;
use crate::core::bulk::ResponseCapture;
use crate::core::dispatch::{HostEntrypoint, RequestBody, SubRequest};
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};

pub async fn forward(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let mut request =
        SubRequest::new(req.method().clone(), req.path()).with_query(req.query_string());
    request.headers = header_pairs(&req);

    let mut capture = ResponseCapture::new();
    state
        .router
        .call(request, RequestBody::from_bytes(body), &mut capture)
        .await?;

    let (status, headers, body) = capture.into_parts()?;
    let status = StatusCode::from_u16(status)
        .map_err(|e| GatewayError::entrypoint(format!("invalid status: {}", e)))?;

    let mut response = HttpResponse::build(status);
    for (name, value) in headers {
        response.append_header((name, value));
    }
    Ok(response.body(body))
}
