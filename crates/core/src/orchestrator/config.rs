//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the conversion orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Capacity of the scheduler's command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Capacity of each job's progress channel.
    /// Progress updates beyond this are dropped by the engine, not queued.
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
}

fn default_command_buffer() -> usize {
    128
}

fn default_progress_buffer() -> usize {
    16
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            progress_buffer: default_progress_buffer(),
        }
    }
}
