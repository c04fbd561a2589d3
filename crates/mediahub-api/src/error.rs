//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use mediahub_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Optional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Handler error wrapping a domain error.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

/// Status code and error code for a domain error kind.
pub fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ErrorKind::Verification => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::ExternalService => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        ErrorKind::Configuration
        | ErrorKind::Storage
        | ErrorKind::Database
        | ErrorKind::Cache
        | ErrorKind::Serialization
        | ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, error_code) = status_for(err.kind);

        if status.is_server_error() {
            tracing::error!(kind = %err.kind, error = %err.message, "Request failed");
        }

        let body = ApiErrorResponse {
            error: error_code.to_string(),
            message: err.message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_their_status() {
        assert_eq!(status_for(ErrorKind::Validation).0, StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Verification).0, StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::NotFound).0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_infrastructure_errors_are_internal() {
        for kind in [ErrorKind::Configuration, ErrorKind::Storage, ErrorKind::Database] {
            assert_eq!(status_for(kind).0, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_response_uses_standard_body() {
        let response = ApiError::from(AppError::verification("Invalid signature")).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
