//! Health check endpoint
//!
//! Always 200. Reports the readiness snapshot taken at startup.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// "cuda" or "cpu"
    pub device: String,
    pub cuda_available: bool,
    pub gpu_name: Option<String>,
    pub gpu_memory: Option<String>,
    /// Backend readiness computed at startup
    pub models_ready: bool,
    pub model_path: String,
    /// Why the backend is not ready
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub readiness_reasons: Vec<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let readiness = &state.readiness;
    let device = &readiness.device;
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "talkgen-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        device: device.device.clone(),
        cuda_available: device.cuda_available,
        gpu_name: device.gpu_name.clone(),
        gpu_memory: device.gpu_memory.clone(),
        models_ready: readiness.backend_ready,
        model_path: readiness.model_path.display().to_string(),
        readiness_reasons: readiness.reasons.clone(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
