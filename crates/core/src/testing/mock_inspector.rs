//! Mock file inspector for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::inspect::{FileDetails, FileInspector, InspectError};

/// Inspector that splits paths without touching the filesystem.
///
/// Every path exists unless marked missing or marked as a directory.
#[derive(Debug, Default)]
pub struct MockInspector {
    missing: Mutex<HashSet<PathBuf>>,
    directories: Mutex<HashSet<PathBuf>>,
}

impl MockInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inspection of `path` fail with `NotFound`.
    pub fn set_missing(&self, path: impl AsRef<Path>) {
        self.missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_ref().to_path_buf());
    }

    /// Make inspection of `path` fail with `NotAFile`.
    pub fn set_directory(&self, path: impl AsRef<Path>) {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_ref().to_path_buf());
    }
}

#[async_trait]
impl FileInspector for MockInspector {
    async fn inspect(&self, path: &Path) -> Result<FileDetails, InspectError> {
        let is_missing = self
            .missing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path);
        if is_missing {
            return Err(InspectError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let is_directory = self
            .directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path);
        if is_directory {
            return Err(InspectError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        FileDetails::from_path(path)
    }
}
