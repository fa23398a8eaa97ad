//! HTTP read surface for a running bmpmon pipeline.
//!
//! Serves the most recent readings followed by one live sample as JSON.
//! Requests only read; they never touch the buffer or the ingestion loop.

use std::num::IntErrorKind;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::Serialize;
use tokio::sync::watch;

use bmpmon_core::{Pipeline, PipelineError, PipelineStatus, Reading};

/// Readings returned by `/json` without a count.
pub const DEFAULT_COUNT: usize = 10;
/// Largest count `/json/{count}` will serve.
pub const MAX_COUNT: usize = 10_000;

/// Shared server state.
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug, Serialize)]
struct ReadingsResponse {
    success: bool,
    count: usize,
    readings: Vec<Reading>,
    /// Error message if request failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ReadingsResponse {
    fn ok(readings: Vec<Reading>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                count: readings.len(),
                readings,
                error: None,
            }),
        )
    }

    fn failed(status: StatusCode, error: String) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: false,
                count: 0,
                readings: Vec::new(),
                error: Some(error),
            }),
        )
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    sensor: String,
    #[serde(flatten)]
    pipeline: PipelineStatus,
}

/// Result of the blocking part of a readings request.
enum Outcome {
    Readings(Vec<Reading>),
    FetchFailed(PipelineError),
    PeekFailed(String),
}

async fn handle_json(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadingsResponse>) {
    respond(&state, DEFAULT_COUNT).await
}

async fn handle_json_count(
    State(state): State<Arc<AppState>>,
    Path(count): Path<String>,
) -> (StatusCode, Json<ReadingsResponse>) {
    match parse_count(&count) {
        Some(n) => respond(&state, n).await,
        None => ReadingsResponse::failed(
            StatusCode::BAD_REQUEST,
            format!("invalid count {count:?}: expected an integer"),
        ),
    }
}

/// Parse a requested count and clamp it to `1..=MAX_COUNT`.
///
/// Integers too large for `i64` clamp like any other out-of-range value.
fn parse_count(raw: &str) -> Option<usize> {
    let n = match raw.parse::<i64>() {
        Ok(n) => n,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => MAX_COUNT as i64,
            IntErrorKind::NegOverflow => 1,
            _ => return None,
        },
    };
    Some(n.clamp(1, MAX_COUNT as i64) as usize)
}

/// Fetch `count` historical readings and append one live sample.
async fn respond(state: &AppState, count: usize) -> (StatusCode, Json<ReadingsResponse>) {
    let start = Instant::now();
    let pipeline = Arc::clone(&state.pipeline);

    let outcome = tokio::task::spawn_blocking(move || {
        let mut readings = match pipeline.fetch(count) {
            Ok(readings) => readings,
            Err(e) => return Outcome::FetchFailed(e),
        };
        match pipeline.peek() {
            Ok(live) => {
                readings.push(live);
                Outcome::Readings(readings)
            }
            Err(failure) => Outcome::PeekFailed(failure.to_string()),
        }
    })
    .await;

    let response = match outcome {
        Ok(Outcome::Readings(readings)) => ReadingsResponse::ok(readings),
        Ok(Outcome::PeekFailed(msg)) => ReadingsResponse::failed(StatusCode::SERVICE_UNAVAILABLE, msg),
        Ok(Outcome::FetchFailed(e @ PipelineError::Closed)) => {
            ReadingsResponse::failed(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Ok(Outcome::FetchFailed(e)) => {
            log::warn!("fetch of {count} readings failed: {e}");
            ReadingsResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => ReadingsResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    log::debug!(
        "served {count} readings ({}) in {:?}",
        response.0,
        start.elapsed()
    );
    response
}

async fn handle_health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let pipeline = Arc::clone(&state.pipeline);
    let status = tokio::task::spawn_blocking(move || pipeline.status())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(HealthResponse {
        status: if status.closed { "closed" } else { "ok" },
        sensor: state.pipeline.sampler().name().to_string(),
        pipeline: status,
    }))
}

async fn handle_index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "bmpmon",
        "version": bmpmon_core::VERSION,
        "endpoints": {
            "/": "This API index",
            "/json": format!("Last {DEFAULT_COUNT} readings followed by a live sample"),
            "/json/{count}": {
                "method": "GET",
                "description": "Last `count` readings followed by a live sample",
                "params": {
                    "count": format!("Number of historical readings (1-{MAX_COUNT})"),
                }
            },
            "/health": "Buffer, store and flush status",
        },
        "examples": {
            "latest": "/json",
            "last_day_at_15m": "/json/96",
        }
    }))
}

/// Build the axum router.
fn build_router(pipeline: Arc<Pipeline>) -> Router {
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/", get(handle_index))
        .route("/json", get(handle_json))
        .route("/json/{count}", get(handle_json_count))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Run the HTTP server until `shutdown` turns `true`.
pub async fn run_server(
    pipeline: Arc<Pipeline>,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = build_router(pipeline);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    log::info!("http server stopped");
    Ok(())
}
