//! HTTP status endpoint.
//!
//! Serves the registry snapshot as JSON for dashboards and ad-hoc inspection.
//! The endpoint reads in-memory state only, so it keeps answering while
//! exports fail.

pub mod instrument;

pub use instrument::{instrument, Instrumentation};

use crate::core::{Result, StatsError, StatusConfig};
use crate::metrics::Registry;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// API server state.
#[derive(Clone)]
struct ApiState {
    registry: Arc<Registry>,
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sources: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

/// Router with `GET <path>` (snapshot) and `GET /health`
pub fn status_router(registry: Arc<Registry>, path: &str) -> Router {
    Router::new()
        .route(path, get(stats_handler))
        .route("/health", get(health_handler))
        .with_state(ApiState { registry })
}

/// Instrumented status router; the status and health routes are not recorded.
pub fn status_app(
    registry: Arc<Registry>,
    config: &StatusConfig,
    instrumentation: Instrumentation,
) -> Router {
    let instrumentation = instrumentation
        .skip_path(config.path.clone())
        .skip_path("/health");
    instrument(status_router(registry, &config.path), instrumentation)
}

/// Serve the status endpoint until `cancel` fires.
///
/// Requests other than the status and health routes are recorded through
/// `instrumentation`.
pub async fn start_server(
    registry: Arc<Registry>,
    config: &StatusConfig,
    instrumentation: Instrumentation,
    cancel: CancellationToken,
) -> Result<()> {
    let app = status_app(registry, config, instrumentation).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        StatsError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to bind to {}: {}", addr, e),
        ))
    })?;

    tracing::info!("Serving stats on http://{}{}", addr, config.path);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    Ok(())
}

/// GET <status path> - every metric record as pretty JSON
async fn stats_handler(State(state): State<ApiState>) -> Response {
    match serde_json::to_vec_pretty(&*state.registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to render stats: {}", e),
                code: 500,
            }),
        )
            .into_response(),
    }
}

/// GET /health - liveness and number of registered sources
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        sources: state.registry.len(),
    })
}
