//! Error types for the conversion engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum EngineError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The requested encoder is not available in this FFmpeg build or on this GPU.
    #[error(
        "Encoder '{encoder}' is not available. Your GPU may not support hardware acceleration \
         for this format; choose another encoder or switch to normal (CPU) encoding."
    )]
    EncoderNotFound { encoder: String },

    /// Conversion process failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl EngineError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Message suitable for showing next to the failed file.
    ///
    /// Includes the last stderr line when FFmpeg produced one.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConversionFailed {
                reason,
                stderr: Some(stderr),
            } => match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                Some(last) => format!("{}: {}", reason, last.trim()),
                None => reason.clone(),
            },
            other => other.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_uses_last_stderr_line() {
        let err = EngineError::conversion_failed(
            "FFmpeg exited with code 1",
            Some("first\nInvalid data found when processing input\n\n".to_string()),
        );
        assert_eq!(
            err.user_message(),
            "FFmpeg exited with code 1: Invalid data found when processing input"
        );
    }

    #[test]
    fn test_user_message_without_stderr() {
        let err = EngineError::Timeout { timeout_secs: 10 };
        assert_eq!(err.user_message(), "Conversion timed out after 10 seconds");
    }

    #[test]
    fn test_encoder_not_found_message() {
        let err = EngineError::EncoderNotFound {
            encoder: "h264_nvenc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("h264_nvenc"));
        assert!(msg.contains("normal (CPU) encoding"));
    }
}
