//! Health check endpoints
//!
//! Probes for load balancers and container orchestration. None of them
//! call Gemini or Stable Horde.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub keys: KeySummary,
    pub notifications_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct KeySummary {
    pub total: usize,
    pub available: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub keys_configured: usize,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
}

/// GET /health
///
/// Reports "degraded" while no key is configured; exhausted keys are
/// expected and reset on their own.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.pool().status();

    Json(HealthResponse {
        status: if pool.total > 0 { "healthy" } else { "degraded" },
        version: state.settings.app_version.clone(),
        environment: state.settings.environment.to_string(),
        uptime_seconds: state.uptime_seconds(),
        keys: KeySummary {
            total: pool.total,
            available: pool.available,
        },
        notifications_configured: state.notifier.is_some(),
    })
}

/// GET /ready
///
/// Ready once at least one Gemini key is configured.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let keys_configured = state.pool().total_count();
    let ready = keys_configured > 0;

    if !ready {
        tracing::warn!("Readiness check failed: no Gemini API keys configured");
    }

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, keys_configured }))
}

/// GET /liveness
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { alive: true })
}
