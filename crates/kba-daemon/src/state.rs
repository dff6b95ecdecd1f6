//! Shared runtime state for kba-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The monitor owns its
//! worker tasks; this module only holds handles to it.

use std::sync::Arc;
use std::time::Duration;

use kba_runtime::StreamMonitor;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::api_types::StatusResponse;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusResponse),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub monitor: Arc<StreamMonitor>,
    /// Budget for POST /v1/monitor/stop.
    pub stop_timeout: Duration,
}

impl AppState {
    pub fn new(monitor: Arc<StreamMonitor>, stop_timeout: Duration) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "kba-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            monitor,
            stop_timeout,
        }
    }

    pub async fn status(&self) -> StatusResponse {
        StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            monitor: self.monitor.status().await,
        }
    }

    /// Send to SSE subscribers; no subscribers is fine.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }

    pub fn log(&self, level: &str, msg: impl Into<String>) {
        self.publish(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that publishes the monitor status every
/// `interval` while the monitor is running.
pub fn spawn_status_tick(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if state.monitor.is_running().await {
                let snap = state.status().await;
                state.publish(BusMsg::Status(snap));
            }
        }
    });
}
