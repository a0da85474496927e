use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use convertino_core::{EngineStatus, RegistryState, SanitizedConfig};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" while the engine cannot convert.
    pub status: String,
    pub version: String,
    pub engine: String,
    pub engine_ready: bool,
    pub orchestrator_running: bool,
    pub registry: RegistryState,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ctx = state.context();
    let engine = ctx.engine_status();
    Json(HealthResponse {
        status: if engine.ready { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: engine.name,
        engine_ready: engine.ready,
        orchestrator_running: ctx.is_running(),
        registry: ctx.registry_state(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /engine - Result of the last readiness check.
pub async fn get_engine(State(state): State<Arc<AppState>>) -> Json<EngineStatus> {
    Json(state.context().engine_status())
}

/// POST /engine/check - Validate the engine again, e.g. after installing FFmpeg.
pub async fn check_engine(State(state): State<Arc<AppState>>) -> Json<EngineStatus> {
    Json(state.context().check_engine().await)
}
