//! Conversion job API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use convertino_core::{BatchReport, FileId, OrchestratorStatus};

use super::error::{api_error, orchestrator_error, ApiError};
use crate::state::AppState;

/// Request body for starting a batch.
///
/// Without `ids`, every at-rest file with a target selected is started.
#[derive(Debug, Default, Deserialize)]
pub struct StartJobsRequest {
    #[serde(default)]
    pub ids: Option<Vec<FileId>>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: FileId,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelAllResponse {
    pub cancelled: usize,
}

/// Queue a batch of files for conversion.
pub async fn start_jobs(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartJobsRequest>>,
) -> Result<(StatusCode, Json<BatchReport>), ApiError> {
    let ctx = state.context();
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let report = match request.ids {
        Some(ids) if ids.is_empty() => {
            return Err(api_error(StatusCode::BAD_REQUEST, "ids cannot be empty"));
        }
        Some(ids) => ctx.start(ids).await,
        None => ctx.start_all().await,
    }
    .map_err(orchestrator_error)?;

    Ok((StatusCode::ACCEPTED, Json(report)))
}

/// Cancel one file's queued or processing job.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = FileId::new(id);
    let ctx = state.context();

    if ctx.file(id).is_none() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("File not found: {}", id),
        ));
    }

    let cancelled = ctx.cancel(id).await.map_err(orchestrator_error)?;
    if !cancelled {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("File {} has no active job", id),
        ));
    }

    Ok(Json(CancelResponse { id, cancelled }))
}

/// Cancel every queued and processing job.
pub async fn cancel_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CancelAllResponse>, ApiError> {
    let cancelled = state
        .context()
        .cancel_all()
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(CancelAllResponse { cancelled }))
}

/// Current scheduler snapshot.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.context().status().await)
}
