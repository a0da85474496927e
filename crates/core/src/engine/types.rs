//! Types for the conversion engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::EngineError;
use crate::capabilities::LogicalType;
use crate::orchestrator::JobHandle;
use crate::registry::FileId;
use crate::settings::{ConversionMode, Settings};

/// Encoder preferences taken from the user settings at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderParams {
    /// Video encoder for profiles that do not force one.
    pub default_encoder: String,
    pub conversion_mode: ConversionMode,
}

impl From<&Settings> for EncoderParams {
    fn from(settings: &Settings) -> Self {
        Self {
            default_encoder: settings.default_encoder.clone(),
            conversion_mode: settings.conversion_mode,
        }
    }
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// A single conversion request handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Dispatch handle this job runs under.
    pub job_id: JobHandle,
    /// Registry entry being converted.
    pub file_id: FileId,
    pub input_path: PathBuf,
    /// Target extension without the dot.
    pub output_extension: String,
    /// Logical type of the input (video, audio, image, ...).
    pub media_type: LogicalType,
    pub encoder: EncoderParams,
}

impl ConversionJob {
    /// Where the converted file is written.
    pub fn output_path(&self) -> PathBuf {
        output_path_for(&self.input_path, &self.output_extension)
    }
}

/// Output path for a conversion: input directory + stem + "." + extension.
pub fn output_path_for(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}.{}", stem, extension.trim_start_matches('.')))
}

/// Progress update during conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// Job ID.
    pub job_id: JobHandle,
    /// Progress percentage (0.0 - 100.0).
    pub percent: f32,
    /// Current processing time in seconds.
    pub time_secs: f64,
    /// Total input duration in seconds, when known.
    pub duration_secs: Option<f64>,
    /// Current processing speed (e.g., "1.5x").
    pub speed: Option<String>,
}

impl ConversionProgress {
    /// Whole percentage clamped to 0..=100.
    pub fn percent_u8(&self) -> u8 {
        if self.percent.is_nan() {
            return 0;
        }
        self.percent.clamp(0.0, 100.0).round() as u8
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Job ID.
    pub job_id: JobHandle,
    /// Output file path.
    pub output_path: PathBuf,
    /// Output file size in bytes.
    pub output_size_bytes: u64,
    /// Wall-clock conversion time in milliseconds.
    pub elapsed_ms: u64,
}

/// Information about a media file, from ffprobe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub format: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Result of the last engine readiness check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub name: String,
    pub ready: bool,
    /// Why the engine is not usable, when it is not.
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl EngineStatus {
    pub fn from_check(name: &str, result: Result<(), EngineError>) -> Self {
        Self {
            name: name.to_string(),
            ready: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("/videos/a.mov"), "mp4"),
            PathBuf::from("/videos/a.mp4")
        );
        assert_eq!(
            output_path_for(Path::new("/music/song.final.flac"), ".mp3"),
            PathBuf::from("/music/song.final.mp3")
        );
        assert_eq!(
            output_path_for(Path::new("clip.avi"), "webm"),
            PathBuf::from("clip.webm")
        );
    }

    #[test]
    fn test_percent_u8_clamps() {
        let mut progress = ConversionProgress {
            job_id: JobHandle::new(),
            percent: 142.7,
            time_secs: 0.0,
            duration_secs: None,
            speed: None,
        };
        assert_eq!(progress.percent_u8(), 100);
        progress.percent = -5.0;
        assert_eq!(progress.percent_u8(), 0);
        progress.percent = 41.6;
        assert_eq!(progress.percent_u8(), 42);
        progress.percent = f32::NAN;
        assert_eq!(progress.percent_u8(), 0);
    }

    #[test]
    fn test_engine_status_from_check() {
        let ready = EngineStatus::from_check("ffmpeg", Ok(()));
        assert!(ready.ready);
        assert!(ready.error.is_none());

        let missing = EngineStatus::from_check(
            "ffmpeg",
            Err(EngineError::FfmpegNotFound {
                path: PathBuf::from("/opt/ffmpeg"),
            }),
        );
        assert!(!missing.ready);
        assert_eq!(
            missing.error.as_deref(),
            Some("FFmpeg not found at path: /opt/ffmpeg")
        );
    }

    #[test]
    fn test_encoder_params_from_settings() {
        let settings = Settings::default().with_conversion_mode(ConversionMode::Lossless);
        let params = EncoderParams::from(&settings);
        assert_eq!(params.default_encoder, "libx264");
        assert_eq!(params.conversion_mode, ConversionMode::Lossless);
    }
}
