//! Request-level error taxonomy and its HTTP mapping.
//!
//! Handlers return [`ApiError`] and let the `IntoResponse` impl translate it
//! into a JSON error body with the right status code:
//! - validation problems -> 400
//! - missing entities    -> 404
//! - storage failures    -> 500 (logged here, internals never leak to callers)
//!
//! Cache and webhook failures deliberately have no variant: they are logged
//! and swallowed at their call sites and are invisible to API callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

// ---

#[derive(Debug, Error)]
pub enum ApiError {
    // ---
    /// Bad input shape, invalid timestamp bounds, empty batch.
    #[error("{0}")]
    Validation(String),

    /// No reading exists for the requested entity.
    #[error("{0}")]
    NotFound(String),

    /// The durable store rejected or failed the operation.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ApiError {
    // ---
    fn status(&self) -> StatusCode {
        // ---
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        // ---
        match self {
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let message = match &self {
            ApiError::Storage(e) => {
                error!("storage error: {}", e);
                "internal storage failure".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (self.status(), body).into_response()
    }
}
