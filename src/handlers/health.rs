//! Liveness endpoint

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
