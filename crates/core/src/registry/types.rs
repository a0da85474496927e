//! Types for the file registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::capabilities::LogicalType;
use crate::inspect::InspectError;

/// Placeholder target before the user picks an output extension.
pub const UNSELECTED: &str = "unselected";

/// Identifier of a registered file.
///
/// Assigned from a monotonic counter and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for FileId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a registered file's conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    #[default]
    Idle,
    Queued,
    Processing,
    Failed,
    Success,
    Cancelled,
}

impl ConversionStatus {
    pub const ALL: [ConversionStatus; 6] = [
        Self::Idle,
        Self::Queued,
        Self::Processing,
        Self::Failed,
        Self::Success,
        Self::Cancelled,
    ];

    /// Queued or processing: the file is owned by the orchestrator.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Whether the status is a final outcome of a conversion attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Success | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Success => "success",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file registered for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: FileId,
    pub dir_path: PathBuf,
    pub full_file_name: String,
    /// File name without extension.
    pub file_name: String,
    /// Normalized (lowercase, no dot) source extension.
    pub file_extension: String,
    pub file_type: LogicalType,
    pub full_path: PathBuf,
    /// Chosen output extension, or [`UNSELECTED`].
    pub selected_extension: String,
    /// Outputs the file may be converted to.
    pub convertibles: BTreeSet<String>,
    pub conversion_status: ConversionStatus,
    /// Percentage, present only while processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Last failure reason, present only while failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_supported: bool,
}

impl FileEntry {
    pub fn has_target(&self) -> bool {
        self.selected_extension != UNSELECTED
    }
}

/// Whether the registry currently holds any files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    #[default]
    Empty,
    Populated,
}

/// Registry-scoped error shown to the user after a rejected registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryNotice {
    pub message: String,
    pub path: PathBuf,
    pub at: DateTime<Utc>,
}

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unsupported file type '{file_type}' for extension '{extension}'")]
    UnsupportedType {
        extension: String,
        file_type: LogicalType,
    },

    #[error("Invalid target '{extension}' for file {id}: {reason}")]
    InvalidTarget {
        id: FileId,
        extension: String,
        reason: String,
    },

    #[error("File not found: {0}")]
    NotFound(FileId),

    #[error("File {0} is queued or processing")]
    Active(FileId),

    #[error(transparent)]
    Inspect(#[from] InspectError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ConversionStatus::Queued.is_active());
        assert!(ConversionStatus::Processing.is_active());
        assert!(!ConversionStatus::Idle.is_active());
        assert!(ConversionStatus::Cancelled.is_terminal());
        assert!(!ConversionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ConversionStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_file_id_is_transparent() {
        let json = serde_json::to_string(&FileId::new(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(FileId::from(7).to_string(), "7");
    }
}
