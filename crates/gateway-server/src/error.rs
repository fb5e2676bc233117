//! API error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::GatewayError;
use serde::Serialize;
use tracing::{error, warn};

/// Error returned by HTTP handlers
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// Create an error with an explicit status and code
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let (status, code) = match &err {
            GatewayError::FeatureUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "feature_unavailable")
            }
            GatewayError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            GatewayError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            GatewayError::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
            GatewayError::Configuration { .. } => (StatusCode::BAD_REQUEST, "configuration_error"),
            GatewayError::UnknownPurpose { .. } => (StatusCode::BAD_REQUEST, "unknown_purpose"),
            GatewayError::UnsupportedTier { .. } => (StatusCode::BAD_REQUEST, "unsupported_tier"),
            GatewayError::ProviderNotConfigured { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "provider_not_configured")
            }
            GatewayError::Store { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            GatewayError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, message = %self.message, "Request failed");
        } else {
            warn!(code = self.code, message = %self.message, "Request rejected");
        }
        let body = ErrorBody {
            error: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
