//! Completed-jobs ledger API handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use convertino_core::{CompletedJob, FileId};

use super::error::{ledger_error, ApiError};
use crate::state::AppState;

/// Query parameters for listing completed jobs.
#[derive(Debug, Deserialize)]
pub struct ListCompletedParams {
    /// Only jobs for this file.
    pub file_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ListCompletedResponse {
    pub jobs: Vec<CompletedJob>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearCompletedResponse {
    pub removed: usize,
}

/// List completed jobs, oldest first.
pub async fn list_completed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCompletedParams>,
) -> Result<Json<ListCompletedResponse>, ApiError> {
    let ctx = state.context();
    let jobs = match params.file_id {
        Some(id) => ctx.completed_jobs_for(FileId::new(id)),
        None => ctx.completed_jobs(),
    }
    .map_err(ledger_error)?;

    Ok(Json(ListCompletedResponse {
        total: jobs.len(),
        jobs,
    }))
}

/// Empty the ledger.
pub async fn clear_completed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearCompletedResponse>, ApiError> {
    let removed = state.context().clear_completed().map_err(ledger_error)?;
    Ok(Json(ClearCompletedResponse { removed }))
}
