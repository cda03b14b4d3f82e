use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{self, trace_api::TraceState};
use crate::query::TraceQuery;

/// Start the trace viewer server
///
/// Constructs the per-file query service, binds to the configured address
/// and serves the JSON API until ctrl-c.
pub async fn start_server(log_file: PathBuf, host: &str, port: u16) -> Result<()> {
    let query = Arc::new(TraceQuery::new(log_file));
    info!(log_file = %query.log_file().display(), "watching trace log");

    let app = create_router(TraceState { query });

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("trace viewer listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Create the Axum router with all routes and middleware
///
/// CORS is permissive: the visualization client is served separately and
/// the API is read-only and unauthenticated by design.
pub fn create_router(state: TraceState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/tree", get(handlers::trace_api::get_tree))
        .route("/api/logs", get(handlers::trace_api::get_logs))
        .route("/api/logs/:id", get(handlers::trace_api::get_log_payload))
        .route("/api/entries", get(handlers::trace_api::get_entries))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
