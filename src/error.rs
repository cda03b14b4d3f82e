use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application error types
///
/// The trace subsystem itself has no fatal error path: malformed lines,
/// missing files, rotation and transient reads all degrade to an empty or
/// stale view. Only structurally invalid requests surface here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Requested resource does not exist (e.g. a log id out of range)
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed request parameters
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound(_) => "not_found",
        AppError::InvalidRequest(_) => "invalid_request",
        AppError::Internal(_) => "internal_error",
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
