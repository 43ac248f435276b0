//! Helper functions for creating specific error types

use super::types::GatewayError;

/// Helper functions for creating specific errors
impl GatewayError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server(message.into())
    }

    pub fn pool_exhausted<S: Into<String>>(message: S) -> Self {
        Self::PoolExhausted(message.into())
    }

    pub fn worker_unavailable<S: Into<String>>(message: S) -> Self {
        Self::WorkerUnavailable(message.into())
    }

    pub fn worker_panicked<S: Into<String>>(message: S) -> Self {
        Self::WorkerPanicked(message.into())
    }

    pub fn entrypoint<S: Into<String>>(message: S) -> Self {
        Self::Entrypoint(message.into())
    }

    /// Whether this error belongs to the server side (5xx) of the taxonomy
    pub fn is_server_error(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_) | Self::BadRequest(_)
        )
    }
}
