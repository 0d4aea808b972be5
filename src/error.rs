// Custom error types and conversions
// This helps in providing consistent error responses in Axum

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::validation::FieldError;

// Application error taxonomy. Nothing here is fatal: the worst case a
// caller sees is "previous data kept, retry available".
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The backend timed out, returned 5xx, or sent a body we could not
    /// parse. Retryable; callers keep whatever they were showing.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A resource the backend genuinely does not have.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or rejected bearer token on an action that needs one.
    /// Routed to the sign-in flow, never conflated with generic failure.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User input rejected before any network call.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// Transient transport-level failures map to the retryable variant
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            AppError::NotFound(error.to_string())
        } else if error.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            AppError::Unauthorized("session rejected by backend".to_string())
        } else {
            AppError::BackendUnavailable(error.to_string())
        }
    }
}

// Implement IntoResponse for AppError to convert errors into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BackendUnavailable(message) => {
                tracing::warn!("Backend unavailable: {}", message);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "backend unavailable", "retryable": true }),
                )
            }
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, json!({ "error": message }))
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized: {}", message);
                (
                    StatusCode::UNAUTHORIZED,
                    json!({ "error": message, "signIn": true }),
                )
            }
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "validation failed", "fields": errors }),
            ),
            AppError::Internal(e) => {
                // Log the detailed error here
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// Define a custom Result type using our AppError
pub type AppResult<T> = Result<T, AppError>;
