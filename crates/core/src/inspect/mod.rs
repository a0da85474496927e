//! File inspection bridge.
//!
//! Splits a user-supplied path into the pieces the registry stores. The
//! filesystem check lives behind [`FileInspector`] so tests can use an
//! in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while inspecting a path.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Not a regular file: {path}")]
    NotAFile { path: PathBuf },

    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decomposed path of a registered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
    /// Parent directory.
    pub dir_path: PathBuf,
    /// File name including extension.
    pub full_file_name: String,
    /// File name without extension.
    pub file_name: String,
    /// Extension without the dot, as it appears on disk.
    pub file_extension: String,
    pub full_path: PathBuf,
}

impl FileDetails {
    /// Splits a path without touching the filesystem.
    pub fn from_path(path: &Path) -> Result<Self, InspectError> {
        let invalid = || InspectError::InvalidPath {
            path: path.to_path_buf(),
        };

        let full_file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
        let file_name = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
        let file_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let dir_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self {
            dir_path,
            full_file_name: full_file_name.to_string(),
            file_name: file_name.to_string(),
            file_extension: file_extension.to_string(),
            full_path: path.to_path_buf(),
        })
    }
}

/// Something that can resolve a path into [`FileDetails`].
#[async_trait]
pub trait FileInspector: Send + Sync {
    async fn inspect(&self, path: &Path) -> Result<FileDetails, InspectError>;
}

/// Inspector backed by the real filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsInspector;

#[async_trait]
impl FileInspector for FsInspector {
    async fn inspect(&self, path: &Path) -> Result<FileDetails, InspectError> {
        if path.as_os_str().is_empty() {
            return Err(InspectError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(InspectError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Err(InspectError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        FileDetails::from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_path_splits_components() {
        let details = FileDetails::from_path(Path::new("/videos/holiday.clip.MOV")).unwrap();
        assert_eq!(details.dir_path, PathBuf::from("/videos"));
        assert_eq!(details.full_file_name, "holiday.clip.MOV");
        assert_eq!(details.file_name, "holiday.clip");
        assert_eq!(details.file_extension, "MOV");
    }

    #[test]
    fn test_from_path_without_extension() {
        let details = FileDetails::from_path(Path::new("/tmp/README")).unwrap();
        assert_eq!(details.file_extension, "");
        assert_eq!(details.file_name, "README");
    }

    #[test]
    fn test_from_path_rejects_root() {
        assert!(matches!(
            FileDetails::from_path(Path::new("/")),
            Err(InspectError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_fs_inspector_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mov");
        std::fs::write(&path, b"data").unwrap();

        let details = FsInspector.inspect(&path).await.unwrap();
        assert_eq!(details.dir_path, dir.path());
        assert_eq!(details.file_extension, "mov");
    }

    #[tokio::test]
    async fn test_fs_inspector_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = FsInspector.inspect(&dir.path().join("missing.mp4")).await;
        assert!(matches!(result, Err(InspectError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_fs_inspector_directory() {
        let dir = TempDir::new().unwrap();
        let result = FsInspector.inspect(dir.path()).await;
        assert!(matches!(result, Err(InspectError::NotAFile { .. })));
    }
}
