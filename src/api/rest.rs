// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Reads come straight from `ChartState`;
// writes are turned into `FeedEvent`s and queued for the feed controller, so
// every POST answers `202 Accepted` and the effect shows up in the next
// published version.
//
// CORS is permissive: the renderer is served from a different origin.
// =============================================================================

use std::sync::Arc;

use anyhow::{bail, Result};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::ChartState;
use crate::feed::FeedEvent;
use crate::runtime_config::IndicatorUpdate;
use crate::types::{Selection, Timeframe};

type ApiError = (StatusCode, Json<serde_json::Value>);

// =============================================================================
// Router construction
// =============================================================================

/// Build the full API router with CORS middleware and shared state.
pub fn router(state: Arc<ChartState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Reads ───────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/dataset", get(dataset))
        .route("/api/v1/status", get(status))
        .route("/api/v1/ticker", get(ticker))
        .route("/api/v1/trades", get(trades))
        // ── Commands ────────────────────────────────────────────────
        .route("/api/v1/selection", post(select))
        .route("/api/v1/indicators", post(set_indicators))
        .route("/api/v1/retry", post(retry))
        // ── WebSocket push feed ─────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<ChartState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Reads
// =============================================================================

async fn dataset(State(state): State<Arc<ChartState>>) -> impl IntoResponse {
    // Version first: a concurrent publish can only make the dataset newer
    // than the version reported, never older.
    let version = state.current_state_version();
    Json(json!({
        "version": version,
        "dataset": &*state.dataset(),
    }))
}

async fn status(State(state): State<Arc<ChartState>>) -> impl IntoResponse {
    Json(state.status())
}

async fn ticker(State(state): State<Arc<ChartState>>) -> impl IntoResponse {
    Json(state.ticker())
}

async fn trades(State(state): State<Arc<ChartState>>) -> impl IntoResponse {
    Json(state.trades())
}

// =============================================================================
// Selection
// =============================================================================

#[derive(Debug, Deserialize)]
struct SelectionRequest {
    #[serde(default)]
    exchange: Option<String>,
    symbol: String,
    timeframe: String,
}

/// Validate a selection request; a missing exchange falls back to
/// `default_exchange`.
fn parse_selection(req: SelectionRequest, default_exchange: &str) -> Result<Selection> {
    let symbol = req.symbol.trim();
    if symbol.is_empty() {
        bail!("symbol must not be empty");
    }

    let timeframe: Timeframe = req.timeframe.parse()?;

    let exchange = req
        .exchange
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(default_exchange);

    Ok(Selection::new(exchange, symbol, timeframe))
}

async fn select(
    State(state): State<Arc<ChartState>>,
    Json(req): Json<SelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let selection = parse_selection(req, &state.default_exchange).map_err(|e| {
        warn!(error = %e, "rejected selection request");
        bad_request(e)
    })?;

    info!(selection = %selection, "selection change requested via API");
    state
        .send_command(FeedEvent::Select(selection.clone()))
        .map_err(unavailable)?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "selection": selection }))))
}

// =============================================================================
// Indicators
// =============================================================================

async fn set_indicators(
    State(state): State<Arc<ChartState>>,
    Json(update): Json<IndicatorUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    // Always queued: the published toggles may lag behind commands still in
    // flight, so only the controller can tell whether this is a change.
    state
        .send_command(FeedEvent::SetIndicators(update))
        .map_err(unavailable)?;

    // Expected result against what is currently published.
    let mut indicators = state.indicators();
    let changes = indicators.apply(update);
    info!(changes = ?changes, "indicator toggles requested via API");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "indicators": indicators, "changes": changes })),
    ))
}

// =============================================================================
// Retry
// =============================================================================

async fn retry(State(state): State<Arc<ChartState>>) -> Result<impl IntoResponse, ApiError> {
    info!("manual retry requested via API");
    state.send_command(FeedEvent::Retry).map_err(unavailable)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "retrying" }))))
}

// =============================================================================
// Helpers
// =============================================================================

fn bad_request(e: anyhow::Error) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": e.to_string() })),
    )
}

fn unavailable(e: anyhow::Error) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": e.to_string() })),
    )
}
