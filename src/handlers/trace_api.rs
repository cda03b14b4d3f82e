//! Trace viewer HTTP API handlers
//!
//! JSON endpoints consumed by the visualization client: the assembled call
//! tree, the paginated log view and single-record payload fetch, plus a raw
//! entries dump for debugging.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::query::{LogsResponse, PayloadResponse, TraceQuery, TreeResponse};
use crate::trace::LogRecord;

/// Shared state for the trace API.
#[derive(Clone)]
pub struct TraceState {
    pub query: Arc<TraceQuery>,
}

/// Query parameters for the paginated log view.
#[derive(Debug, Deserialize)]
pub struct LogsParams {
    /// Maximum number of rows to return (server-clamped)
    pub limit: Option<usize>,
    /// Payload preview length in characters (server-clamped)
    pub preview: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct EntriesParams {
    pub limit: Option<usize>,
}

/// GET /api/tree - assembled call forest with metrics
pub async fn get_tree(
    State(state): State<TraceState>,
) -> Result<Json<TreeResponse>, AppError> {
    let query = state.query.clone();
    let response = run_blocking(move || query.tree()).await?;
    Ok(Json(response))
}

/// GET /api/logs?limit=&preview= - most recent log rows, oldest first
pub async fn get_logs(
    State(state): State<TraceState>,
    Query(params): Query<LogsParams>,
) -> Result<Json<LogsResponse>, AppError> {
    let query = state.query.clone();
    let response = run_blocking(move || query.logs(params.limit, params.preview)).await?;
    Ok(Json(response))
}

/// GET /api/logs/{id} - full untruncated payload for one log row
pub async fn get_log_payload(
    State(state): State<TraceState>,
    Path(id): Path<usize>,
) -> Result<Json<PayloadResponse>, AppError> {
    let query = state.query.clone();
    run_blocking(move || query.log_payload(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("log id {id} out of range")))
}

/// GET /api/entries?limit= - raw parsed records for debugging
pub async fn get_entries(
    State(state): State<TraceState>,
    Query(params): Query<EntriesParams>,
) -> Result<Json<Vec<LogRecord>>, AppError> {
    let query = state.query.clone();
    let entries = run_blocking(move || query.entries(params.limit)).await?;
    Ok(Json(entries))
}

// The refresh does bounded synchronous file I/O; keep it off the async
// worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| AppError::Internal(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_params_all_optional() {
        let params: LogsParams = serde_json::from_str("{}").unwrap();
        assert!(params.limit.is_none());
        assert!(params.preview.is_none());

        let params: LogsParams = serde_json::from_str(r#"{"limit":50,"preview":300}"#).unwrap();
        assert_eq!(params.limit, Some(50));
        assert_eq!(params.preview, Some(300));
    }
}
