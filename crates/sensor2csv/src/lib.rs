// Sensor ingestion server
//
// Accepts JSON readings from field sensors over HTTP and appends them to one
// CSV log per payload shape.
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Non-blocking bounded queue with 503 backpressure
// - Single writer task with per-file locking, fsync and bounded retries
// - Inactivity monitor, metrics snapshot and ingestion history
// - Structured logging with tracing
// - Graceful shutdown that drains queued readings

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sensor2csv_config::RuntimeConfig;
use sensor2csv_core::ValidationError;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod handlers;
mod init;

pub mod history;
pub mod monitor;
pub mod queue;
pub mod service;
pub mod stats;
pub mod worker;

use handlers::{
    handle_data, handle_data2, handle_data3, handle_data4, health_check, history_html,
    history_json, metrics_snapshot, ready_check,
};
pub use init::init_tracing;
use init::init_writer;
pub use service::{IngestError, IngestionService};

/// Application state shared across all requests
#[derive(Clone)]
pub(crate) struct AppState {
    pub service: Arc<IngestionService>,
}

/// Error type that implements IntoResponse
#[derive(Debug)]
pub(crate) enum AppError {
    Validation(ValidationError),
    QueueFull,
    PayloadTooLarge { size: usize, limit: usize },
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "validation failed",
                    "details": e.into_details(),
                })),
            )
                .into_response(),
            AppError::QueueFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "queued_failed"})),
            )
                .into_response(),
            AppError::PayloadTooLarge { size, limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({
                    "error": "payload too large",
                    "size_bytes": size,
                    "limit_bytes": limit,
                })),
            )
                .into_response(),
            AppError::Internal(e) => {
                error!("Request error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal server error"})),
                )
                    .into_response()
            }
        }
    }
}

impl AppError {
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Internal(error.into())
    }
}

fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    AppError::internal(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}

/// Build the HTTP router around a service
pub fn build_router(service: Arc<IngestionService>) -> Router {
    let state = AppState { service };

    let routes = Router::new()
        .route("/data", post(handle_data))
        .route("/data2", post(handle_data2))
        .route("/data3", post(handle_data3))
        .route("/data4", post(handle_data4))
        .route("/healthz", get(health_check))
        .route("/ready", get(ready_check))
        .route("/metrics", get(metrics_snapshot))
        .route("/history", get(history_html))
        .route("/history/json", get(history_json));

    with_middleware(routes).with_state(state)
}

/// Panic isolation, request tracing and gzip bodies (some device firmwares
/// compress their uploads).
fn with_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TraceLayer::new_for_http())
            .layer(RequestDecompressionLayer::new().gzip(true)),
    )
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    // Initialize tracing with config
    init_tracing(&config);

    let addr = config.server.listen_addr.clone();
    let (sink, policy) = init_writer(&config)?;

    info!(
        "Write queue capacity {} (warn at {}), history size {}",
        config.queue.maxsize,
        config.queue.warn_threshold(),
        config.history.max
    );
    info!(
        "Max payload size set to {} bytes",
        config.request.max_payload_bytes
    );

    let (service, receiver) = IngestionService::new(config);
    let writer_handle = worker::spawn(Arc::clone(&service), receiver, sink, policy);
    let monitor_handle = monitor::spawn(Arc::clone(&service));

    let app = build_router(Arc::clone(&service));

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Sensor HTTP endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/data         - pressure/temperature readings", addr);
    info!("  POST http://{}/data2        - CO2 + environmental readings", addr);
    info!("  POST http://{}/data3        - outdoor readings", addr);
    info!("  POST http://{}/data4        - composite board readings", addr);
    info!("  GET  http://{}/healthz      - Health check", addr);
    info!("  GET  http://{}/ready        - Readiness check", addr);
    info!("  GET  http://{}/metrics      - Metrics snapshot", addr);
    info!("  GET  http://{}/history      - Recent ingestion history", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    // Start server with graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    // Signal background tasks to stop and wait for the writer to drain
    service.shutdown();
    if let Err(e) = writer_handle.await {
        warn!(error = %e, "Writer task did not shut down cleanly");
    }
    if let Err(e) = monitor_handle.await {
        warn!(error = %e, "Monitor task did not shut down cleanly");
    }

    served?;
    info!("Server shutdown complete");

    Ok(())
}
