use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use snapdoc_core::error::CoreError;
use snapdoc_worker::DispatchError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`DispatchError`] for captures
/// the pipeline refused.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The capture pipeline refused the task (not running or shutting down).
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::DuplicateKey(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            AppError::Dispatch(DispatchError::NotRunning(_) | DispatchError::Closed) => {
                tracing::warn!(error = %self, "Capture refused, pipeline not running");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Document capture is not accepting requests".to_string(),
                )
            }
            AppError::Dispatch(err) => {
                tracing::error!(error = %err, "Capture task was not accepted");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
