//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external seams (the
//! conversion engine and file inspection), allowing the orchestrator to be
//! exercised end to end without FFmpeg or real media files.
//!
//! # Example
//!
//! ```rust,ignore
//! use convertino_core::testing::{MockEngine, MockInspector};
//!
//! let engine = MockEngine::new();
//! let inspector = MockInspector::new();
//!
//! // Configure mock behavior
//! engine.fail_path("/media/broken.mov", "corrupt input").await;
//! inspector.set_missing("/media/gone.mp4");
//!
//! // Use in ConversionContext::with_components...
//! ```

mod mock_engine;
mod mock_inspector;

pub use mock_engine::MockEngine;
pub use mock_inspector::MockInspector;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::capabilities::{CapabilityTable, LogicalType};
    use crate::engine::{ConversionJob, EncoderParams};
    use crate::ledger::CompletedJob;
    use crate::orchestrator::JobHandle;
    use crate::registry::FileId;
    use crate::settings::Settings;

    /// Small table with one video and one audio type.
    pub fn capability_table() -> CapabilityTable {
        CapabilityTable::default()
            .with_type("video", &["mov", "mp4", "mkv"], &["mp4", "webm", "mkv", "mp3"])
            .with_type("audio", &["wav", "flac", "mp3"], &["mp3", "flac", "wav"])
    }

    /// Default settings with the given concurrency limit.
    pub fn settings_with_limit(limit: usize) -> Settings {
        Settings::default().with_max_concurrency(limit)
    }

    /// Create a conversion job with reasonable defaults.
    pub fn conversion_job(file_id: u64, input: &str, extension: &str) -> ConversionJob {
        ConversionJob {
            job_id: JobHandle::new(),
            file_id: FileId::new(file_id),
            input_path: PathBuf::from(input),
            output_extension: extension.to_string(),
            media_type: LogicalType::new("video"),
            encoder: EncoderParams::default(),
        }
    }

    /// Create a completed job record.
    pub fn completed_job(file_id: u64, input: &str, output: &str) -> CompletedJob {
        CompletedJob::new(
            FileId::new(file_id),
            Duration::from_millis(1500),
            input,
            output,
        )
    }
}
