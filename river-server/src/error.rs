//! Error types for river-server HTTP handlers

use crate::services::{LibraryError, TranscodeError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown track id (404)
    #[error("{0}")]
    NotFound(String),

    /// Requested output format not in the format table (400)
    #[error("{0}")]
    UnknownFormat(String),

    /// Encoder failed for this request (500)
    #[error("{0}")]
    EncodeFailed(String),

    /// Library walk failed; previous index still published (500)
    #[error("{0}")]
    ReloadFailed(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::TrackNotFound(_) => ApiError::NotFound(err.to_string()),
            LibraryError::UnknownFormat(_) => ApiError::UnknownFormat(err.to_string()),
            LibraryError::Reload(_) => ApiError::ReloadFailed(err.to_string()),
            LibraryError::Transcode(TranscodeError::EncodeFailed { .. }) => {
                ApiError::EncodeFailed(err.to_string())
            }
            LibraryError::Transcode(_) | LibraryError::Setup { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::UnknownFormat(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_FORMAT"),
            ApiError::EncodeFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODE_FAILED"),
            ApiError::ReloadFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RELOAD_FAILED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!(code = error_code, "{}", self);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
