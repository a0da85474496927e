//! Settings store: JSON file on disk plus a watch channel for observers.

use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::types::Settings;
use super::SettingsError;

/// Holds the current settings and persists every change.
///
/// Observers (the orchestrator) subscribe through [`SettingsStore::subscribe`]
/// and see each update as a new value on the watch channel.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path`.
    ///
    /// A missing file is created with defaults. An unreadable or invalid file
    /// is an error: startup should not continue with unknown preferences.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();

        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str::<Settings>(&raw)
                .map_err(|e| SettingsError::Parse {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
                .normalized(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Settings file {} not found, writing defaults", path.display());
                let defaults = Settings::default();
                write_settings(&path, &defaults).await?;
                defaults
            }
            Err(e) => return Err(SettingsError::Io(e)),
        };

        debug!("Loaded settings: {:?}", settings);

        let (tx, _) = watch::channel(settings);
        Ok(Self {
            path: Some(path),
            tx,
        })
    }

    /// Store that never touches the filesystem.
    pub fn in_memory(settings: Settings) -> Self {
        let (tx, _) = watch::channel(settings.normalized());
        Self { path: None, tx }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replaces the settings, notifies observers and persists the new value.
    ///
    /// Persistence failures are logged, the in-memory value is still updated.
    pub async fn update(&self, settings: Settings) -> Settings {
        let settings = settings.normalized();
        self.tx.send_replace(settings.clone());
        info!(
            "Settings updated: mode={}, max_concurrency={}",
            settings.conversion_mode, settings.max_concurrency
        );

        if let Some(path) = &self.path {
            if let Err(e) = write_settings(path, &settings).await {
                error!("Failed to persist settings to {}: {}", path.display(), e);
            }
        }

        settings
    }
}

async fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| SettingsError::Serialize(e.to_string()))?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ConversionMode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::load(&path).await.unwrap();
        assert_eq!(store.current(), Settings::default());
        assert!(path.exists());

        let written: Settings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Settings::default());
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"conversion_mode":"lossless","max_concurrency":4,"open_when_finished":false}"#,
        )
        .unwrap();

        let store = SettingsStore::load(&path).await.unwrap();
        let settings = store.current();
        assert_eq!(settings.conversion_mode, ConversionMode::Lossless);
        assert_eq!(settings.max_concurrency, 4);
        assert!(!settings.open_when_finished);
        assert_eq!(settings.default_encoder, "libx264");
    }

    #[tokio::test]
    async fn test_load_invalid_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = SettingsStore::load(&path).await;
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_update_persists_and_notifies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(&path).await.unwrap();
        let mut rx = store.subscribe();

        let updated = store
            .update(Settings::default().with_max_concurrency(5))
            .await;
        assert_eq!(updated.max_concurrency, 5);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().max_concurrency, 5);

        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert_eq!(reloaded.current().max_concurrency, 5);
    }

    #[tokio::test]
    async fn test_update_clamps_concurrency() {
        let store = SettingsStore::in_memory(Settings::default());
        let updated = store
            .update(Settings::default().with_max_concurrency(0))
            .await;
        assert_eq!(updated.max_concurrency, 1);
        assert_eq!(store.current().max_concurrency, 1);
    }

    #[tokio::test]
    async fn test_update_survives_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(&path).await.unwrap();

        // Replace the file with a directory so the write fails.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let updated = store
            .update(Settings::default().with_max_concurrency(3))
            .await;
        assert_eq!(updated.max_concurrency, 3);
        assert_eq!(store.current().max_concurrency, 3);
    }
}
