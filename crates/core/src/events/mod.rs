//! Event bus.
//!
//! Every observable state change in the registry and the orchestrator is
//! published here. Consumers (the WebSocket shell, tests) subscribe instead
//! of sharing mutable references to the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::capabilities::LogicalType;
use crate::ledger::CompletedJob;
use crate::orchestrator::{JobHandle, SkipReason};
use crate::registry::FileId;
use crate::settings::Settings;

/// Notification emitted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A file was added to the registry.
    FileRegistered {
        id: FileId,
        path: PathBuf,
        file_type: LogicalType,
    },
    /// A registration attempt was refused.
    RegistrationRejected { path: PathBuf, reason: String },
    /// The user picked an output extension.
    TargetSelected { id: FileId, extension: String },
    FileRemoved { id: FileId },
    /// The last entry left the registry; registry-scoped state was reset.
    RegistryReset,

    JobQueued { id: FileId },
    JobSkipped { id: FileId, reason: SkipReason },
    JobStarted { id: FileId, handle: JobHandle },
    JobProgress { id: FileId, percent: u8 },
    JobCompleted { job: CompletedJob },
    JobFailed { id: FileId, reason: String },
    JobCancelled { id: FileId },
    AllJobsCancelled { count: usize },
    /// The active set drained; counts cover jobs finished since it was last empty.
    BatchFinished {
        succeeded: usize,
        failed: usize,
        cancelled: usize,
    },

    SettingsChanged { settings: Settings },

    /// The engine was validated; `error` explains why it is not usable.
    EngineChecked { ready: bool, error: Option<String> },
}

impl Event {
    /// Short name used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileRegistered { .. } => "file_registered",
            Self::RegistrationRejected { .. } => "registration_rejected",
            Self::TargetSelected { .. } => "target_selected",
            Self::FileRemoved { .. } => "file_removed",
            Self::RegistryReset => "registry_reset",
            Self::JobQueued { .. } => "job_queued",
            Self::JobSkipped { .. } => "job_skipped",
            Self::JobStarted { .. } => "job_started",
            Self::JobProgress { .. } => "job_progress",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::JobCancelled { .. } => "job_cancelled",
            Self::AllJobsCancelled { .. } => "all_jobs_cancelled",
            Self::BatchFinished { .. } => "batch_finished",
            Self::SettingsChanged { .. } => "settings_changed",
            Self::EngineChecked { .. } => "engine_checked",
        }
    }
}

/// Event with the time it was published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// Broadcast sink for [`Event`]s.
///
/// Cheaply cloneable. Publishing never blocks; a subscriber that falls behind
/// the channel capacity loses the oldest events and sees a `Lagged` error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: Event) {
        tracing::trace!("Publishing event: {}", event.kind());
        // No subscribers is not an error
        let _ = self.sender.send(EventEnvelope {
            timestamp: Utc::now(),
            event,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
