//! Types for the conversion orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::registry::{FileId, RegistryError};

/// Identity of one dispatch of a file to the engine.
///
/// A fresh handle is minted every time a job is dispatched, so a result
/// arriving for a handle that is no longer tracked belongs to an earlier,
/// cancelled attempt and is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(Uuid);

impl JobHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a file was not queued by `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("file is not registered")]
    NotFound,
    #[error("file type is not supported")]
    Unsupported,
    #[error("no target extension selected")]
    NoTarget,
    #[error("file is already queued or processing")]
    AlreadyActive,
}

/// A file that `start` refused to queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedJob {
    pub id: FileId,
    pub reason: SkipReason,
}

/// Outcome of a `start` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Files queued, in enqueue order.
    pub queued: Vec<FileId>,
    pub skipped: Vec<SkippedJob>,
}

/// Terminal outcomes counted since the active set was last empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

/// Snapshot of the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the scheduler task is running.
    pub running: bool,
    /// Jobs waiting for a slot.
    pub queued: usize,
    /// Jobs currently dispatched to the engine.
    pub processing: usize,
    /// Concurrency limit in effect.
    pub limit: usize,
    /// Queued and processing file ids.
    pub active_ids: Vec<FileId>,
}

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The scheduler task is not running.
    #[error("orchestrator is not running")]
    NotRunning,

    /// Registry error while purging entries.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
