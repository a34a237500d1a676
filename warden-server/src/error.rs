//! HTTP error mapping
//!
//! Engine errors become opaque responses. Policy tuples and store messages are
//! logged, never returned to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use warden_rbac::RbacError;

/// Error type returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Internal server error")]
    Internal,
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl From<RbacError> for ApiError {
    fn from(err: RbacError) -> Self {
        match &err {
            RbacError::UserNotFound { .. } => ApiError::NotFound {
                message: "User not found".to_string(),
            },
            RbacError::RoleNotFound { .. } => ApiError::NotFound {
                message: "Role not found".to_string(),
            },
            RbacError::InvalidRole { .. } | RbacError::InvalidPermission { .. } => {
                ApiError::BadRequest {
                    message: err.to_string(),
                }
            }
            RbacError::Unauthenticated { .. } => ApiError::Unauthorized,
            _ => {
                tracing::error!(error = %err, "Request failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        (self.status_code(), Json(body)).into_response()
    }
}
