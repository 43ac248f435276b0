//! HTTP response handling for errors

use super::types::GatewayError;
use crate::storage::StorageError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

impl GatewayError {
    /// HTTP status and machine readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            GatewayError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            GatewayError::Serialization(_) => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            GatewayError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ERR_VALIDATE"),
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            GatewayError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            GatewayError::PoolExhausted(_) => (StatusCode::SERVICE_UNAVAILABLE, "POOL_EXHAUSTED"),
            GatewayError::WorkerUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "WORKER_UNAVAILABLE")
            }
            GatewayError::Storage(StorageError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            GatewayError::Storage(StorageError::UniqueViolation { .. }) => {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            GatewayError::Transaction(_) | GatewayError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TRANSACTION_ERROR")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code) = self.status_and_code();

        let message = if status_code.is_server_error()
            && !matches!(
                self,
                GatewayError::PoolExhausted(_) | GatewayError::WorkerUnavailable(_)
            ) {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: error_code.to_string(),
                message,
                timestamp: chrono::Utc::now().timestamp(),
                request_id: None, // This should be set by middleware
            },
        };

        HttpResponse::build(status_code).json(error_response)
    }
}

/// Standard error response format
#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub timestamp: i64,
    pub request_id: Option<String>,
}
