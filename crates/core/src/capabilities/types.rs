//! Types for the capability resolver.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// The capability-table category an extension maps to (e.g. "video").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalType(String);

impl LogicalType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allowed inputs and outputs for one logical type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCapabilities {
    /// Extensions accepted as conversion input.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Extensions this type can be converted to.
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Static lookup data: extension -> type and type -> {inputs, outputs}.
///
/// The on-disk shape mirrors two tables: `extensions` maps an extension to
/// the list of types it may belong to (the first one wins), `types` maps a
/// type name to its capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityTable {
    #[serde(default)]
    pub extensions: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub types: HashMap<String, TypeCapabilities>,
}

/// Answer to "what can I do with this extension" for API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub extension: String,
    pub logical_type: LogicalType,
    pub supported: bool,
    pub outputs: BTreeSet<String>,
}

/// Normalizes an extension: trims, strips a leading dot, lowercases.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

impl CapabilityTable {
    /// Built-in table used when no capability file is configured.
    pub fn builtin() -> Self {
        const VIDEO_IN: &[&str] = &[
            "mp4", "mkv", "mov", "avi", "webm", "flv", "wmv", "m4v", "mpg", "mpeg", "ts", "3gp",
        ];
        const VIDEO_OUT: &[&str] = &[
            "mp4", "mkv", "mov", "avi", "webm", "flv", "wmv", "mp3", "aac", "flac", "wav", "ogg",
        ];
        const AUDIO_IN: &[&str] = &["mp3", "aac", "flac", "wav", "ogg", "m4a", "opus", "wma"];
        const AUDIO_OUT: &[&str] = &["mp3", "aac", "flac", "wav", "ogg"];
        const IMAGE_IN: &[&str] = &[
            "png", "jpg", "jpeg", "webp", "bmp", "tiff", "tif", "gif", "ico",
        ];
        const IMAGE_OUT: &[&str] = &["png", "jpg", "webp", "bmp", "ico", "tiff"];

        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut extensions = HashMap::new();
        for (kind, list) in [("video", VIDEO_IN), ("audio", AUDIO_IN), ("image", IMAGE_IN)] {
            for ext in list {
                extensions.insert(ext.to_string(), vec![kind.to_string()]);
            }
        }

        let mut types = HashMap::new();
        types.insert(
            "video".to_string(),
            TypeCapabilities {
                inputs: owned(VIDEO_IN),
                outputs: owned(VIDEO_OUT),
            },
        );
        types.insert(
            "audio".to_string(),
            TypeCapabilities {
                inputs: owned(AUDIO_IN),
                outputs: owned(AUDIO_OUT),
            },
        );
        types.insert(
            "image".to_string(),
            TypeCapabilities {
                inputs: owned(IMAGE_IN),
                outputs: owned(IMAGE_OUT),
            },
        );

        Self { extensions, types }
    }

    /// Adds or replaces a type, registering its inputs in the extension map.
    pub fn with_type(mut self, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        for ext in inputs {
            self.extensions
                .insert(normalize_extension(ext), vec![name.to_string()]);
        }
        self.types.insert(
            name.to_string(),
            TypeCapabilities {
                inputs: inputs.iter().map(|e| normalize_extension(e)).collect(),
                outputs: outputs.iter().map(|e| normalize_extension(e)).collect(),
            },
        );
        self
    }

    /// Rewrites every extension in the table to its normalized form.
    ///
    /// Keys that collide after normalization keep the types of both, taken
    /// in key order.
    pub fn normalized(self) -> Self {
        let mut keys: Vec<_> = self.extensions.into_iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        let mut extensions: HashMap<String, Vec<String>> = HashMap::new();
        for (ext, kinds) in keys {
            let merged = extensions.entry(normalize_extension(&ext)).or_default();
            for kind in kinds {
                if !merged.contains(&kind) {
                    merged.push(kind);
                }
            }
        }

        let types = self
            .types
            .into_iter()
            .map(|(name, caps)| {
                let caps = TypeCapabilities {
                    inputs: caps.inputs.iter().map(|e| normalize_extension(e)).collect(),
                    outputs: caps.outputs.iter().map(|e| normalize_extension(e)).collect(),
                };
                (name, caps)
            })
            .collect();

        Self { extensions, types }
    }

    /// Maps an extension to its logical type.
    ///
    /// Lookup is case-insensitive. Unknown extensions become their own
    /// singleton type (`".xyz"`); this never fails.
    pub fn classify(&self, extension: &str) -> LogicalType {
        let ext = normalize_extension(extension);
        match self.extensions.get(&ext).and_then(|types| types.first()) {
            Some(kind) => LogicalType::new(kind.clone()),
            None => LogicalType::new(format!(".{}", ext)),
        }
    }

    /// Whether the type has a capability entry at all.
    pub fn is_known_type(&self, logical_type: &LogicalType) -> bool {
        self.types.contains_key(logical_type.as_str())
    }

    /// True iff the type's input list contains the extension.
    pub fn is_supported_input(&self, logical_type: &LogicalType, extension: &str) -> bool {
        let ext = normalize_extension(extension);
        self.types
            .get(logical_type.as_str())
            .map(|caps| caps.inputs.iter().any(|input| normalize_extension(input) == ext))
            .unwrap_or(false)
    }

    /// Outputs of the type, minus the source extension itself.
    pub fn convertible_outputs(&self, logical_type: &LogicalType, excluding: &str) -> BTreeSet<String> {
        let source = normalize_extension(excluding);
        self.types
            .get(logical_type.as_str())
            .map(|caps| {
                caps.outputs
                    .iter()
                    .map(|out| normalize_extension(out))
                    .filter(|out| *out != source)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Convenience view combining the three lookups.
    pub fn describe(&self, extension: &str) -> ExtensionInfo {
        let ext = normalize_extension(extension);
        let logical_type = self.classify(&ext);
        ExtensionInfo {
            supported: self.is_supported_input(&logical_type, &ext),
            outputs: self.convertible_outputs(&logical_type, &ext),
            extension: ext,
            logical_type,
        }
    }
}
