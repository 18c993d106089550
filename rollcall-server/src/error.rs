//! Error types for rollcall-server
//!
//! Two layers:
//! - [`CoreError`]: outcomes of the attendance core (registry, gateway,
//!   recorder, scheduler, roster) independent of HTTP
//! - [`ApiError`]: HTTP mapping with the `{"error": {"code", "message"}}` body

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the attendance core
#[derive(Debug, Error)]
pub enum CoreError {
    /// Request rejected before any side effect
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The session's window is closed, not yet open, or the session is gone
    #[error("Session {session_id} is not accepting attendance")]
    NotEligible { session_id: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Face matcher did not answer within the configured bound
    #[error("Face matcher did not respond within {0:?}")]
    GatewayTimeout(Duration),

    /// Face matcher unreachable or answered with an error
    #[error("Face matcher unavailable: {0}")]
    GatewayUnavailable(String),

    /// rollcall-common error (storage, config)
    #[error(transparent)]
    Common(#[from] rollcall_common::Error),
}

impl CoreError {
    /// Caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::GatewayTimeout(_) | CoreError::GatewayUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Common(rollcall_common::Error::Database(err))
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or rejected credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. duplicate faculty id
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Session not accepting attendance (409)
    #[error("Session {session_id} is not accepting attendance")]
    NotEligible { session_id: i64 },

    /// Face matcher timed out (504)
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Face matcher unavailable (503)
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// rollcall-common error
    #[error("Common error: {0}")]
    Common(#[from] rollcall_common::Error),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::NotEligible { session_id } => ApiError::NotEligible { session_id },
            CoreError::Forbidden(msg) => ApiError::Forbidden(msg),
            e @ CoreError::GatewayTimeout(_) => ApiError::GatewayTimeout(e.to_string()),
            CoreError::GatewayUnavailable(msg) => ApiError::GatewayUnavailable(msg),
            CoreError::Common(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_code, retryable) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", false),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN", false),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", false),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", false),
            ApiError::NotEligible { .. } => (StatusCode::CONFLICT, "NOT_ELIGIBLE", false),
            ApiError::GatewayTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT", true),
            ApiError::GatewayUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_UNAVAILABLE", true)
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false),
            ApiError::Common(err) => match err {
                rollcall_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", false),
                rollcall_common::Error::InvalidInput(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", false)
                }
                rollcall_common::Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", false),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", false),
            },
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if retryable {
            error["retryable"] = json!(true);
        }

        let body = Json(json!({ "error": error }));

        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"rollcall\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_are_retryable() {
        assert!(CoreError::GatewayTimeout(Duration::from_secs(5)).is_retryable());
        assert!(CoreError::GatewayUnavailable("refused".to_string()).is_retryable());
        assert!(!CoreError::NotEligible { session_id: 1 }.is_retryable());
        assert!(!CoreError::Validation("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (CoreError::Validation("x".into()).into(), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (CoreError::NotEligible { session_id: 3 }.into(), StatusCode::CONFLICT),
            (CoreError::Forbidden("x".into()).into(), StatusCode::FORBIDDEN),
            (
                CoreError::GatewayTimeout(Duration::from_millis(10)).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                CoreError::GatewayUnavailable("x".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                rollcall_common::Error::Conflict("dup".into()).into(),
                StatusCode::CONFLICT,
            ),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = ApiError::Unauthorized("missing".into()).into_response();
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
