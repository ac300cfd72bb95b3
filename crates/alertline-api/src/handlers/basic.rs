//! Health and connectivity checks.

use axum::extract::State;
use axum::Extension;
use serde::Serialize;
use serde_json::{json, Value};

use super::{ok, HandlerResult, ServerState};
use crate::auth::AuthUser;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime: u64,
}

/// GET /api/health
///
/// Public. Reports the service as up.
pub async fn health_handler(State(state): State<ServerState>) -> HandlerResult<HealthStatus> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    ok(HealthStatus {
        status: "ok",
        service: "alertline",
        version: alertline_core::VERSION,
        uptime: uptime.max(0) as u64,
    })
}

/// GET /api/ping
///
/// Lets clients verify their credentials.
pub async fn ping_handler(Extension(user): Extension<AuthUser>) -> HandlerResult<Value> {
    tracing::debug!(
        category = "server",
        user_id = ?user.user_id,
        client_id = ?user.client_id,
        "Ping"
    );
    ok(json!({ "ok": true }))
}
