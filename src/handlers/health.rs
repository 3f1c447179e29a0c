use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

use crate::handlers::AppState;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness: the process is up and serving.
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness: the order store answers a ping.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let result = crate::db::check_connection(&state.db).await;
    let database = ComponentHealth {
        status: if result.is_ok() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        error: result.as_ref().err().map(|e| e.response_message()),
        latency_ms: start.elapsed().as_millis() as u64,
    };

    let (code, status) = match database.status {
        ComponentStatus::Up => (StatusCode::OK, "ready"),
        ComponentStatus::Down => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
    };

    (
        code,
        Json(json!({
            "status": status,
            "checks": { "database": database },
        })),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness_check))
        .route("/ready", get(readiness_check))
}
