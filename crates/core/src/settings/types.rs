//! Persisted user settings.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

/// How the engine should trade speed for quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ConversionMode {
    /// CPU encoding with a balanced CRF.
    #[default]
    Normal,
    /// CPU encoding with a high-quality CRF.
    Lossless,
    /// Hardware encoder when one is available, CPU otherwise.
    Hwaccel,
}

impl ConversionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Lossless => "lossless",
            Self::Hwaccel => "hwaccel",
        }
    }
}

// Unrecognized modes fall back to normal encoding.
impl From<String> for ConversionMode {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "lossless" => Self::Lossless,
            "hwaccel" => Self::Hwaccel,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User preferences, loaded once at startup and saved on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub conversion_mode: ConversionMode,

    /// Maximum simultaneous conversions. Always at least 1.
    #[serde(
        default = "default_max_concurrency",
        deserialize_with = "deserialize_concurrency"
    )]
    pub max_concurrency: usize,

    /// Video encoder used by profiles that do not force one.
    #[serde(default = "default_encoder")]
    pub default_encoder: String,

    #[serde(default = "default_open_when_finished")]
    pub open_when_finished: bool,
}

fn default_max_concurrency() -> usize {
    2
}

fn default_encoder() -> String {
    "libx264".to_string()
}

fn default_open_when_finished() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conversion_mode: ConversionMode::default(),
            max_concurrency: default_max_concurrency(),
            default_encoder: default_encoder(),
            open_when_finished: default_open_when_finished(),
        }
    }
}

impl Settings {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn with_conversion_mode(mut self, mode: ConversionMode) -> Self {
        self.conversion_mode = mode;
        self
    }

    pub fn with_open_when_finished(mut self, open: bool) -> Self {
        self.open_when_finished = open;
        self
    }

    /// Enforces the invariants the deserializer enforces for values built in code.
    pub fn normalized(mut self) -> Self {
        if self.max_concurrency == 0 {
            warn!("max_concurrency 0 is invalid, clamping to 1");
            self.max_concurrency = 1;
        }
        if self.default_encoder.trim().is_empty() {
            self.default_encoder = default_encoder();
        }
        self
    }
}

fn deserialize_concurrency<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    if raw < 1 {
        warn!("max_concurrency {} is invalid, clamping to 1", raw);
        return Ok(1);
    }
    Ok(usize::try_from(raw).unwrap_or(usize::MAX))
}
