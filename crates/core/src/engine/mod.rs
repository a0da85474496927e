//! Conversion engine bridge.
//!
//! The [`ConversionEngine`] trait is the black box the orchestrator drives:
//! it either produces an output file or fails. [`FfmpegEngine`] implements
//! it by running FFmpeg out of process.
//!
//! # Features
//!
//! - Per-format codec profiles (video containers, audio, still images)
//! - Normal, lossless and hardware-accelerated conversion modes
//! - Progress reporting from FFmpeg's `-progress` output
//! - Child process killed and partial output removed when a job is dropped
//!
//! # Example
//!
//! ```ignore
//! use convertino_core::engine::{ConversionEngine, FfmpegEngine};
//!
//! let engine = FfmpegEngine::with_defaults();
//! engine.validate().await?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//! let outcome = engine.convert(job, tx).await?;
//! println!("Wrote {} in {} ms", outcome.output_path.display(), outcome.elapsed_ms);
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod opener;
mod profile;
mod traits;
mod types;

pub use capabilities::{EncoderCapabilities, HardwareEncoder};
pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use opener::{NoopOpener, ResultOpener, SystemOpener};
pub use profile::{CodecProfile, QualityControl};
pub use traits::ConversionEngine;
pub use types::{
    output_path_for, ConversionJob, ConversionOutcome, ConversionProgress, EncoderParams,
    EngineStatus, MediaInfo,
};
