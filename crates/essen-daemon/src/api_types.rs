//! Request and response types for all essen-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use essen_lock::{LockView, Point, Rect};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: String,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// /v1/lock/*
// ---------------------------------------------------------------------------

/// Where the renderer placed the grid. Without `centers` the dots are
/// spread evenly over `bounds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRequest {
    pub bounds: Rect,
    #[serde(default)]
    pub centers: Option<[Point; 9]>,
}

/// Response body when the lock refuses an event or cannot proceed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockErrorResponse {
    /// Stable code, e.g. "HASH_UNAVAILABLE" | "ILLEGAL_TRANSITION"
    pub error: String,
    pub message: String,
    pub view: Option<LockView>,
}

// ---------------------------------------------------------------------------
// /v1/app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppGateResponse {
    pub revealed: bool,
    /// Set while a reveal is scheduled but not yet due.
    pub reveal_in_ms: Option<u64>,
}
