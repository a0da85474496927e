//! Settings store.
//!
//! User preferences (conversion mode, concurrency limit, default encoder,
//! open-when-finished) persisted as a JSON file.

mod store;
mod types;

pub use store::SettingsStore;
pub use types::{ConversionMode, Settings};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to serialize settings: {0}")]
    Serialize(String),
}
