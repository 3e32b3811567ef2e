use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cirrus_core::error::CoreError;
use cirrus_core::queue::QueueError;
use cirrus_core::submission::SubmitError;
use cirrus_core::task::TaskHandle;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{ "error": message, "code": KIND }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `cirrus_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A rejected submission from the gateway.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The task store failed while serving a status query.
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Task {0} not found")]
    TaskNotFound(TaskHandle),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal(message: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %message, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Submission errors ---
            AppError::Submit(submit) => match submit {
                SubmitError::Unauthorized(msg) => {
                    (StatusCode::FORBIDDEN, "UNAUTHORIZED", msg.clone())
                }
                SubmitError::ValidationFailed(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone())
                }
                SubmitError::EnqueueFailed(msg) => {
                    tracing::warn!(error = %msg, "Enqueue failed");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "ENQUEUE_FAILED",
                        "The task could not be queued; try again".to_string(),
                    )
                }
                SubmitError::Internal(msg) => internal(msg),
            },

            AppError::Queue(err) => internal(&err.to_string()),

            // --- HTTP-specific errors ---
            AppError::TaskNotFound(handle) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Task {handle} not found"),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
