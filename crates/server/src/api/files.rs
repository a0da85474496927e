//! File registry API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use convertino_core::{FileEntry, FileId, RegistryNotice, RegistryState};

use super::error::{api_error, orchestrator_error, registry_error, ApiError};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request body for registering a file.
#[derive(Debug, Deserialize)]
pub struct RegisterFileRequest {
    pub path: PathBuf,
}

/// Request body for choosing a target extension.
#[derive(Debug, Deserialize)]
pub struct SetTargetRequest {
    pub extension: String,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<FileEntry>,
    pub total: usize,
    pub state: RegistryState,
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    pub notice: Option<RegistryNotice>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List registered files in registration order.
pub async fn list_files(State(state): State<Arc<AppState>>) -> Json<ListFilesResponse> {
    let ctx = state.context();
    let files = ctx.files();
    Json(ListFilesResponse {
        total: files.len(),
        state: ctx.registry_state(),
        files,
    })
}

/// Register a file for conversion.
pub async fn register_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterFileRequest>,
) -> Result<(StatusCode, Json<FileEntry>), ApiError> {
    if body.path.as_os_str().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "path cannot be empty"));
    }

    let entry = state
        .context()
        .register_file(&body.path)
        .await
        .map_err(registry_error)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get a registered file by ID.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<FileEntry>, ApiError> {
    state
        .context()
        .file(FileId::new(id))
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("File not found: {}", id)))
}

/// Choose the output extension for a file.
pub async fn set_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<SetTargetRequest>,
) -> Result<Json<FileEntry>, ApiError> {
    state
        .context()
        .set_target(FileId::new(id), &body.extension)
        .map(Json)
        .map_err(registry_error)
}

/// Remove a file, cancelling its conversion if one is active.
pub async fn remove_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<FileEntry>, ApiError> {
    state
        .context()
        .remove_file(FileId::new(id))
        .await
        .map(Json)
        .map_err(orchestrator_error)
}

/// Cancel every job and empty the registry.
pub async fn delete_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    let removed = state
        .context()
        .delete_all()
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(DeleteAllResponse { removed }))
}

/// Last rejected registration, cleared by the next successful one.
pub async fn get_notice(State(state): State<Arc<AppState>>) -> Json<NoticeResponse> {
    Json(NoticeResponse {
        notice: state.context().notice(),
    })
}
