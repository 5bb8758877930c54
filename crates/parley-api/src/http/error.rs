//! Gateway error type mapping to HTTP status codes and a JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use parley_types::error::ChatError;

/// Message returned whenever the caller has no usable session.
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Gateway-level error. Serialized as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum AppError {
    /// No session cookie, or the CMS rejected it.
    Unauthorized(String),
    /// Rejected before reaching the CMS.
    Validation(String),
    /// The caller asked for something they do not own or that is gone.
    NotFound(String),
    /// The CMS failed or answered with something unreadable.
    Upstream(ChatError),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Auth(_) => AppError::Unauthorized(NOT_AUTHENTICATED.to_string()),
            ChatError::Validation(msg) => AppError::Validation(msg),
            other => AppError::Upstream(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(ChatError::Network { status: Some(404), .. }) => {
                StatusCode::NOT_FOUND
            }
            AppError::Upstream(ChatError::Network { .. } | ChatError::Decode(_)) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) | AppError::Validation(msg) | AppError::NotFound(msg) => {
                msg.clone()
            }
            AppError::Upstream(e) => e.user_message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = ?self, "Gateway request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_hide_cms_text() {
        let err = AppError::from(ChatError::Auth("Invalid token".to_string()));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), NOT_AUTHENTICATED);
    }

    #[test]
    fn test_cms_failures_are_bad_gateway() {
        let err = AppError::from(ChatError::network(Some(500), "Failed to fetch chat sessions"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), "Failed to fetch chat sessions");

        let missing = AppError::from(ChatError::network(Some(404), "Not Found"));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err = AppError::from(ChatError::Validation("password is required".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
