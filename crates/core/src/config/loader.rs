use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CONVERTINO_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[server]
port = "eighty"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"
port = 3000

[engine]
timeout_secs = 120
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.engine.timeout_secs, 120);
    }

    #[test]
    fn test_load_config_all_sections() {
        let toml = r#"
[settings]
path = "/var/lib/convertino/settings.json"

[ledger]
path = "/var/lib/convertino/completed.db"

[capabilities]
path = "/etc/convertino/capabilities.toml"

[engine]
ffmpeg_path = "/usr/bin/ffmpeg"
extra_ffmpeg_args = ["-threads", "4"]

[orchestrator]
command_buffer = 64

[events]
capacity = 32
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(
            config.settings.path,
            Path::new("/var/lib/convertino/settings.json")
        );
        assert!(config.ledger.path.is_some());
        assert!(config.capabilities.path.is_some());
        assert_eq!(config.engine.extra_ffmpeg_args, vec!["-threads", "4"]);
        assert_eq!(config.orchestrator.command_buffer, 64);
        assert_eq!(config.orchestrator.progress_buffer, 16);
        assert_eq!(config.events.capacity, 32);
        assert_eq!(config.server.port, 8080);
    }
}
