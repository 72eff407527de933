use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

/// Error taxonomy for the billing core.
///
/// Validation errors are malformed requests; not-found errors reference
/// missing entities; business-rule violations are well-formed requests
/// the domain rejects; number conflicts surface only when the single
/// numbering retry also collides. Persistence failures propagate as a
/// generic internal error and never leave a partial write behind.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("no billable tasks found for this period")]
    NoBillableTasks,

    #[error("tasks found but no prices defined")]
    NoPricedTasks,

    #[error("invoice number conflict")]
    NumberConflict,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BillingError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            BillingError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            BillingError::NoBillableTasks => (StatusCode::NOT_FOUND, self.to_string()),
            BillingError::NoPricedTasks => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            BillingError::NumberConflict => (StatusCode::CONFLICT, self.to_string()),
            BillingError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
