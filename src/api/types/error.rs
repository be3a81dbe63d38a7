//! HTTP error envelope

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::domain::DomainError;

/// Seconds a client should wait before retrying a 503
const RETRY_AFTER_SECS: &str = "1";

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub message: String,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn message(&self) -> &str {
        &self.response.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry = self.status == StatusCode::SERVICE_UNAVAILABLE;
        let mut response = (self.status, Json(self.response)).into_response();

        if retry {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECS),
            );
        }

        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Forbidden { message } | DomainError::KeyMismatch { message } => {
                Self::forbidden(message)
            }
            DomainError::Unauthenticated { message } | DomainError::InvalidKey { message } => {
                Self::unauthorized(message)
            }
            DomainError::InvalidState { message }
            | DomainError::Conflict { message }
            | DomainError::Validation { message }
            | DomainError::InvalidId { message } => Self::bad_request(message),
            DomainError::Unavailable { message } => {
                warn!(retryable = true, error = %message, "Storage unavailable");
                Self::unavailable(message)
            }
            DomainError::Storage { message }
            | DomainError::Configuration { message }
            | DomainError::Internal { message } => {
                error!(error = %message, "Request failed");
                Self::internal(message)
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.response.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).status
    }

    #[test]
    fn test_domain_error_mapping() {
        assert_eq!(status_of(DomainError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(DomainError::forbidden("x")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(DomainError::key_mismatch("x")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(DomainError::invalid_key("x")), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(DomainError::unauthenticated("x")), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(DomainError::invalid_state("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::conflict("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::invalid_id("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::unavailable("x")), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(DomainError::storage("x")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(DomainError::internal("x")), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_message_is_preserved() {
        let err = ApiError::from(DomainError::conflict(
            "You already have an active API key for this model",
        ));
        assert_eq!(err.message(), "You already have an active API key for this model");
    }

    #[test]
    fn test_unavailable_sets_retry_after() {
        let response = ApiError::from(DomainError::unavailable("timed out")).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn test_other_errors_have_no_retry_after() {
        let response = ApiError::not_found("missing").into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_error_serialization() {
        let err = ApiError::unauthorized("Invalid or revoked API key");
        let json = serde_json::to_string(&err.response).unwrap();

        assert_eq!(json, r#"{"message":"Invalid or revoked API key"}"#);
    }
}
