//! Request and response types for the kba-daemon HTTP endpoints.
//!
//! No business logic lives here.

use kba_runtime::StatusSnapshot;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/status and monitor control
// ---------------------------------------------------------------------------

/// Returned by GET /v1/status and every successful monitor control call;
/// also carried inside SSE `status` events.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub monitor: StatusSnapshot,
}

/// Body of a 409 (monitor state conflict) or 400 (bad request).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStreamRequest {
    pub stream_id: String,
}
