//! Sub-request synthesis from bulk items

use super::types::BulkRequestItem;
use crate::core::dispatch::{JSON_CONTENT_TYPE, RequestBody, SubRequest};
use crate::utils::error::{GatewayError, Result};
use actix_web::http::Method;
use once_cell::sync::Lazy;
use url::Url;

/// Base for resolving relative endpoints; only path and query are kept
static ENDPOINT_BASE: Lazy<Option<Url>> = Lazy::new(|| Url::parse("http://bulk.local/").ok());

/// Outer headers that describe the outer body and must not leak into sub-requests
const BODY_HEADERS: [&str; 3] = ["content-length", "content-type", "transfer-encoding"];

/// Build the request description and body for one item.
///
/// `outer_headers` are the headers of the bulk call itself; they are forwarded
/// to every sub-request, with the item's own headers taking precedence.
pub fn synthesize(
    item: &BulkRequestItem,
    outer_headers: &[(String, String)],
) -> Result<(SubRequest, RequestBody)> {
    let method = Method::from_bytes(item.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| GatewayError::validation(format!("invalid method: {}", item.method)))?;

    let url = ENDPOINT_BASE
        .as_ref()
        .ok_or_else(|| GatewayError::internal("endpoint base URL is invalid"))?
        .join(&item.endpoint)
        .map_err(|e| GatewayError::validation(format!("invalid endpoint {}: {}", item.endpoint, e)))?;

    let body = serde_json::to_vec(item.body.as_ref().unwrap_or(&serde_json::Value::Null))?;

    let mut request = SubRequest::new(method, url.path()).with_query(url.query().unwrap_or(""));
    request.headers = merge_headers(outer_headers, &item.headers);
    Ok((request, RequestBody::from_bytes(body)))
}

fn merge_headers(
    outer: &[(String, String)],
    item: &[(String, String)],
) -> Vec<(String, String)> {
    let overridden = |name: &str| {
        BODY_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
            || item.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    };

    let mut headers: Vec<(String, String)> = outer
        .iter()
        .filter(|(name, _)| !overridden(name))
        .cloned()
        .collect();
    if !item.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-type")) {
        headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
    }
    headers.extend(item.iter().cloned());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header<'a>(request: &'a SubRequest, name: &str) -> Vec<&'a str> {
        request
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_path_and_query_split() {
        let item = BulkRequestItem::new("get", "/api/v1/entity/parent_entity/?sort=id&page%5Blimit%5D=5");
        let (request, _) = synthesize(&item, &[]).unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/api/v1/entity/parent_entity/");
        assert_eq!(request.query, "sort=id&page%5Blimit%5D=5");
    }

    #[test]
    fn test_absent_body_is_json_null() {
        let item = BulkRequestItem::new("DELETE", "/x/1/");
        let (_, mut body) = synthesize(&item, &[]).unwrap();
        assert_eq!(body.read_to_end().as_ref(), b"null");

        let item = BulkRequestItem::new("POST", "/x/").with_body(json!({"name": "a"}));
        let (_, mut body) = synthesize(&item, &[]).unwrap();
        assert_eq!(body.read_to_end().as_ref(), br#"{"name":"a"}"#);
    }

    #[test]
    fn test_headers_forwarded_and_item_wins() {
        let outer = vec![
            ("authorization".to_string(), "Bearer outer".to_string()),
            ("x-request-id".to_string(), "r1".to_string()),
            ("content-length".to_string(), "999".to_string()),
        ];
        let item = BulkRequestItem::new("GET", "/x/").with_header("Authorization", "Bearer item");
        let (request, _) = synthesize(&item, &outer).unwrap();

        assert_eq!(header(&request, "authorization"), vec!["Bearer item"]);
        assert_eq!(header(&request, "x-request-id"), vec!["r1"]);
        assert!(header(&request, "content-length").is_empty());
        assert_eq!(header(&request, "content-type"), vec![JSON_CONTENT_TYPE]);
    }

    #[test]
    fn test_invalid_method_is_rejected() {
        let item = BulkRequestItem::new("GE T", "/x/");
        assert!(matches!(
            synthesize(&item, &[]),
            Err(GatewayError::Validation(_))
        ));
    }
}
