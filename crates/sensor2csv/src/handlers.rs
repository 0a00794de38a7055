// HTTP request handlers
//
// Sensor ingestion, health, metrics and history endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use metrics::counter;
use sensor2csv_core::Endpoint;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::history::render_html;
use crate::service::IngestError;
use crate::{AppError, AppState};

/// POST /data - pressure/temperature probe
pub(crate) async fn handle_data(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Response, AppError> {
    handle_ingest(Endpoint::Data, &state, body)
}

/// POST /data2 - CO2 + environmental sensor
pub(crate) async fn handle_data2(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Response, AppError> {
    handle_ingest(Endpoint::Data2, &state, body)
}

/// POST /data3 - outdoor environmental sensor
pub(crate) async fn handle_data3(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Response, AppError> {
    handle_ingest(Endpoint::Data3, &state, body)
}

/// POST /data4 - composite sensor board
pub(crate) async fn handle_data4(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Response, AppError> {
    handle_ingest(Endpoint::Data4, &state, body)
}

fn handle_ingest(
    endpoint: Endpoint,
    state: &AppState,
    body: axum::body::Bytes,
) -> Result<Response, AppError> {
    counter!("sensor2csv.ingest.requests", 1, "endpoint" => endpoint.as_str());
    debug!(endpoint = %endpoint, bytes = body.len(), "Received reading");

    let max_payload = state.service.config().request.max_payload_bytes;
    if body.len() > max_payload {
        counter!(
            "sensor2csv.ingest.rejected",
            1,
            "endpoint" => endpoint.as_str(),
            "reason" => "too_large"
        );
        return Err(AppError::PayloadTooLarge {
            size: body.len(),
            limit: max_payload,
        });
    }

    match state.service.ingest(endpoint, &body) {
        Ok(()) => Ok((StatusCode::OK, Json(json!({"status": "enqueued"}))).into_response()),
        Err(IngestError::Validation(e)) => Err(AppError::Validation(e)),
        Err(IngestError::QueueFull) => Err(AppError::QueueFull),
    }
}

/// GET /healthz - liveness
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// GET /ready - ready while the writer task is consuming the queue
pub(crate) async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.service.writer_running() && !state.service.is_shutting_down() {
        (StatusCode::OK, Json(json!({"status": "ready"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready"})),
        )
    }
}

/// GET /metrics - counters, queue occupancy and inactivity
pub(crate) async fn metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.metrics_snapshot())
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryParams {
    limit: Option<usize>,
}

impl HistoryParams {
    fn resolve(&self, max: usize) -> usize {
        self.limit.map_or(max, |limit| limit.min(max))
    }
}

/// GET /history - HTML table of recent ingestion events
pub(crate) async fn history_html(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let history = state.service.history();
    let entries = history.recent(params.resolve(history.max()));
    Html(render_html(&entries))
}

/// GET /history/json - the same entries as JSON
pub(crate) async fn history_json(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let history = state.service.history();
    Json(history.recent(params.resolve(history.max())))
}
