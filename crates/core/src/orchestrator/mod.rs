//! Conversion orchestrator.
//!
//! Owns the job queue and drives registered files through the engine:
//! - **Queue**: files wait in enqueue order until a slot frees up
//! - **Dispatch**: at most `max_concurrency` jobs run at once, read from the
//!   settings at promotion time
//! - **Cancel**: queued jobs leave the queue, running jobs are aborted, and a
//!   late result from an aborted job is discarded

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::ConversionOrchestrator;
pub use types::{
    BatchReport, BatchSummary, JobHandle, OrchestratorError, OrchestratorStatus, SkipReason,
    SkippedJob,
};
