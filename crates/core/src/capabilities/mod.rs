//! Capability resolver.
//!
//! Pure lookup data: which logical type an extension belongs to, which
//! extensions a type accepts as input and which it can be converted to.
//! The table is either the built-in default or loaded from a JSON/TOML file.

mod types;

pub use types::{
    normalize_extension, CapabilityTable, ExtensionInfo, LogicalType, TypeCapabilities,
};

use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a capability table.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Capability table not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read capability table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse capability table: {0}")]
    ParseError(String),
}

/// Loads a capability table from disk, choosing the format by file extension.
pub fn load_capabilities(path: &Path) -> Result<CapabilityTable, CapabilityError> {
    if !path.exists() {
        return Err(CapabilityError::FileNotFound(path.display().to_string()));
    }

    let raw = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let table: CapabilityTable = if is_toml {
        toml::from_str(&raw).map_err(|e| CapabilityError::ParseError(e.to_string()))?
    } else {
        serde_json::from_str(&raw).map_err(|e| CapabilityError::ParseError(e.to_string()))?
    };

    Ok(table.normalized())
}
