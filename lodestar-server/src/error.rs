//! Error handling for the Lodestar server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lodestar::LodestarError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    /// Engine error
    #[error(transparent)]
    Lodestar(#[from] LodestarError),

    /// Bad request error
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Lodestar(err) => match err {
                LodestarError::Validation(_) | LodestarError::EmptySearchQuery => {
                    StatusCode::BAD_REQUEST
                }
                LodestarError::NotFound(_) => StatusCode::NOT_FOUND,
                LodestarError::MergeConflict { .. } | LodestarError::IdentityConflict { .. } => {
                    StatusCode::CONFLICT
                }
                LodestarError::AllGeneratorsFailed { .. } | LodestarError::ML(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Internal(_) => "internal_error",
            ServerError::Lodestar(err) => match err {
                LodestarError::Validation(_) | LodestarError::EmptySearchQuery => {
                    "validation_error"
                }
                LodestarError::NotFound(_) => "not_found",
                LodestarError::MergeConflict { .. } => "merge_conflict",
                LodestarError::IdentityConflict { .. } => "identity_conflict",
                LodestarError::AllGeneratorsFailed { .. } => "all_generators_failed",
                LodestarError::ML(_) => "ml_unavailable",
                LodestarError::Storage(_) => "storage_error",
                LodestarError::Configuration(_) => "configuration_error",
                _ => "internal_error",
            },
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Request failed");
        }
        (status, Json(self.to_response_body())).into_response()
    }
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Helper function to create a bad request error
pub fn bad_request(message: impl Into<String>) -> ServerError {
    ServerError::BadRequest(message.into())
}
