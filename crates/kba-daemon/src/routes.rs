//! Axum router and all HTTP handlers for kba-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` compose the bare router.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use kba_runtime::MonitorError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{AddStreamRequest, ErrorResponse, HealthResponse, StatusResponse},
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/monitor/start", post(monitor_start))
        .route("/v1/monitor/stop", post(monitor_stop))
        .route("/v1/monitor/streams", post(monitor_add_stream))
        .with_state(state)
}

/// Monitor state conflicts are 409 with the error text as body.
fn conflict(e: MonitorError) -> Response {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

async fn publish_status(st: &AppState) -> StatusResponse {
    let snap = st.status().await;
    st.publish(BusMsg::Status(snap.clone()));
    snap
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(publish_status(&st).await))
}

// ---------------------------------------------------------------------------
// POST /v1/monitor/start
// ---------------------------------------------------------------------------

pub(crate) async fn monitor_start(State(st): State<Arc<AppState>>) -> Response {
    if let Err(e) = st.monitor.start().await {
        return conflict(e);
    }
    let snap = publish_status(&st).await;
    info!(session = ?snap.monitor.session_id, "monitor/start");
    st.log("INFO", "monitor started");
    (StatusCode::OK, Json(snap)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/monitor/stop
// ---------------------------------------------------------------------------

/// Returns the final snapshot of the session just stopped.
pub(crate) async fn monitor_stop(State(st): State<Arc<AppState>>) -> Response {
    let last = match st.monitor.stop(st.stop_timeout).await {
        Ok(s) => s,
        Err(e) => return conflict(e),
    };
    let snap = StatusResponse {
        daemon_uptime_secs: uptime_secs(),
        monitor: last,
    };
    info!(imported = snap.monitor.records_imported, "monitor/stop");
    st.publish(BusMsg::Status(snap.clone()));
    st.log("INFO", "monitor stopped");
    (StatusCode::OK, Json(snap)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/monitor/streams
// ---------------------------------------------------------------------------

pub(crate) async fn monitor_add_stream(
    State(st): State<Arc<AppState>>,
    Json(req): Json<AddStreamRequest>,
) -> Response {
    let stream_id = req.stream_id.trim();
    if stream_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "stream_id must not be empty".to_string(),
            }),
        )
            .into_response();
    }
    if let Err(e) = st.monitor.add_stream(stream_id).await {
        return conflict(e);
    }
    info!(stream = stream_id, "monitor/streams");
    st.log("INFO", format!("stream {stream_id} added"));
    (StatusCode::OK, Json(publish_status(&st).await)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        let m = msg.ok()?; // lagged / closed
        let event_name = match &m {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::LogLine { .. } => "log",
        };
        let data = serde_json::to_string(&m).ok()?;
        Some(Ok(Event::default().event(event_name).data(data)))
    })
}
