//! API error type for talkgen-server
//!
//! Two response shapes: client errors as `{"error"}` (400) and server
//! errors as `{"error", "details"}` (500). Full diagnostics go to the log,
//! never to the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::dispatch::DispatchError;
use crate::intake::ValidationError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad upload (400)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Uploads could not be written to staging (500)
    #[error("Failed to stage uploads: {0}")]
    Staging(#[source] std::io::Error),

    /// Backend path failed (500)
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Handler panicked (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string() }),
            ),
            ApiError::Staging(err) => {
                error!("Staging failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Failed to stage uploads",
                        "details": "temporary storage unavailable",
                    }),
                )
            }
            ApiError::Dispatch(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Video generation failed",
                    "details": err.public_details(),
                }),
            ),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Internal server error",
                        "details": "unexpected failure while handling request",
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
