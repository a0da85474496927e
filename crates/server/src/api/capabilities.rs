use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use convertino_core::{CapabilityTable, ExtensionInfo};

use crate::state::AppState;

/// Classification and reachable outputs for an extension.
pub async fn describe_extension(
    State(state): State<Arc<AppState>>,
    Path(extension): Path<String>,
) -> Json<ExtensionInfo> {
    Json(state.context().describe(&extension))
}

/// The whole capability table.
pub async fn get_capabilities(State(state): State<Arc<AppState>>) -> Json<CapabilityTable> {
    Json(state.context().capabilities().clone())
}
