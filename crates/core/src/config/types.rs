use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Where user settings are persisted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}

/// Completed jobs ledger configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// SQLite database path. Without one the ledger lives in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Capability table configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CapabilitiesConfig {
    /// JSON or TOML table. Without one the built-in table is used.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Events buffered per subscriber before slow ones start lagging.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}

/// Config as served by the API
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub settings: SettingsConfig,
    pub ledger: SanitizedLedgerConfig,
    pub capabilities: CapabilitiesConfig,
    pub engine: SanitizedEngineConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLedgerConfig {
    pub persistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Engine config without the raw extra arguments
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_log_level: String,
    pub timeout_secs: u64,
    pub extra_args_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            settings: config.settings.clone(),
            ledger: SanitizedLedgerConfig {
                persistent: config.ledger.path.is_some(),
                path: config.ledger.path.clone(),
            },
            capabilities: config.capabilities.clone(),
            engine: SanitizedEngineConfig {
                ffmpeg_path: config.engine.ffmpeg_path.clone(),
                ffprobe_path: config.engine.ffprobe_path.clone(),
                ffmpeg_log_level: config.engine.ffmpeg_log_level.clone(),
                timeout_secs: config.engine.timeout_secs,
                extra_args_configured: !config.engine.extra_ffmpeg_args.is_empty(),
            },
            events: config.events.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.settings.path.to_str().unwrap(), "settings.json");
        assert!(config.ledger.path.is_none());
        assert!(config.capabilities.path.is_none());
        assert_eq!(config.events.capacity, 256);
        assert_eq!(config.engine.ffmpeg_path.to_str().unwrap(), "ffmpeg");
        assert_eq!(config.orchestrator.command_buffer, 128);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[settings]
path = "/data/settings.json"

[ledger]
path = "/data/ledger.db"

[capabilities]
path = "/data/capabilities.toml"

[engine]
ffmpeg_path = "/usr/local/bin/ffmpeg"
timeout_secs = 600
extra_ffmpeg_args = ["-threads", "4"]

[orchestrator]
progress_buffer = 4

[events]
capacity = 64
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.ledger.path.as_deref().unwrap().to_str().unwrap(),
            "/data/ledger.db"
        );
        assert_eq!(config.engine.timeout_secs, 600);
        assert_eq!(config.engine.ffprobe_path.to_str().unwrap(), "ffprobe");
        assert_eq!(config.orchestrator.progress_buffer, 4);
        assert_eq!(config.events.capacity, 64);
    }

    #[test]
    fn test_sanitized_config() {
        let mut config = Config::default();
        config.engine.extra_ffmpeg_args = vec!["-threads".to_string(), "4".to_string()];

        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.ledger.persistent);
        assert!(sanitized.engine.extra_args_configured);
        assert_eq!(sanitized.server.port, 8080);

        let json = serde_json::to_value(&sanitized).unwrap();
        assert!(json["engine"].get("extra_ffmpeg_args").is_none());
        assert!(json["ledger"].get("path").is_none());
    }
}
