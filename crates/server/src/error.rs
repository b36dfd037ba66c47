//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_metadata::MetadataError;
use depot_signer::SignerError;
use depot_storage::StorageError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),

    #[error("core error: {0}")]
    Core(#[from] depot_core::Error),

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),
}

impl From<MetadataError> for ApiError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::HashMismatch { expected, actual } => {
                Self::HashMismatch { expected, actual }
            }
            other => Self::Metadata(other),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
            Self::Core(_) => "core_error",
            Self::Signer(_) => "signer_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::HashMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                MetadataError::Validation(_) => StatusCode::BAD_REQUEST,
                MetadataError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(e) => match e {
                depot_core::Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Signer(e) => match e {
                SignerError::KeyNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let mismatch: ApiError = MetadataError::HashMismatch {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        }
        .into();
        assert_eq!(mismatch.code(), "hash_mismatch");
        assert_eq!(mismatch.status_code(), StatusCode::BAD_REQUEST);

        let missing: ApiError = MetadataError::NotFound("widget".to_string()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let missing: ApiError = StorageError::NotFound("k".to_string()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let invalid: ApiError = depot_core::Error::Validation("empty".to_string()).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let io: ApiError = StorageError::Io(std::io::Error::other("disk")).into();
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
