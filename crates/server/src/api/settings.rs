use axum::{extract::State, Json};
use std::sync::Arc;

use convertino_core::Settings;

use crate::state::AppState;

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
    Json(state.context().settings())
}

/// Replace the settings. Missing fields take their defaults and a
/// concurrency limit below 1 is raised to 1.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> Json<Settings> {
    Json(state.context().update_settings(settings).await)
}
