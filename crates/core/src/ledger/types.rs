//! Types for the completed jobs ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::registry::FileId;

/// Record of one successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedJob {
    /// File the job converted.
    pub id: FileId,
    /// Elapsed time in seconds, millisecond precision.
    pub total_time: f64,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    pub input_file: PathBuf,
    pub new_file_path: PathBuf,
    pub completed_at: DateTime<Utc>,
}

impl CompletedJob {
    pub fn new(
        id: FileId,
        elapsed: Duration,
        input_file: impl Into<PathBuf>,
        new_file_path: impl Into<PathBuf>,
    ) -> Self {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        Self {
            id,
            total_time: elapsed_ms as f64 / 1000.0,
            elapsed_ms,
            input_file: input_file.into(),
            new_file_path: new_file_path.into(),
            completed_at: Utc::now(),
        }
    }
}

/// Errors from ledger storage.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_time_has_millisecond_precision() {
        let job = CompletedJob::new(
            FileId::new(1),
            Duration::from_micros(2_345_678),
            "/in/a.mov",
            "/in/a.mp4",
        );
        assert_eq!(job.elapsed_ms, 2345);
        assert!((job.total_time - 2.345).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serialization() {
        let job = CompletedJob::new(FileId::new(3), Duration::from_secs(1), "/a.wav", "/a.mp3");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["new_file_path"], "/a.mp3");
        assert_eq!(json["total_time"], 1.0);
    }
}
