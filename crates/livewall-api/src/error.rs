use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failure taxonomy for user-initiated actions. Every action fails on its
/// own: a rejected submit, like, or transition reports back and leaves the
/// rest of the view untouched.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    /// Action is invalid for the event's current status.
    #[error("{0}")]
    State(String),

    /// Event creation or code generation was rejected.
    #[error("{0}")]
    Creation(String),

    /// Participant insert was rejected.
    #[error("{0}")]
    Join(String),

    /// Note or like write was rejected.
    #[error("{0}")]
    Submit(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::State(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Creation(msg) | ApiError::Join(msg) | ApiError::Submit(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Database(anyhow::anyhow!("blocking task failed: {}", e))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
