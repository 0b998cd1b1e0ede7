//! Liveness probe and watchdog introspection.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

use super::guard::AdminGuard;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /health: lightweight health probe (public, no auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/watchdog: scheduler state and last cycle (admin)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn watchdog_status(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let settings = state.watchdog.settings();
    Json(serde_json::json!({
        "enabled": state.config.watchdog.enabled,
        "running": state.watchdog.is_running(),
        "interval_ms": settings.interval.as_millis() as u64,
        "probe_timeout_ms": settings.probe_timeout.as_millis() as u64,
        "pool_size": settings.pool_size,
        "last_cycle": state.watchdog.last_report(),
    }))
}
