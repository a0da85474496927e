//! In-memory file registry.

use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::capabilities::{normalize_extension, CapabilityTable};
use crate::events::{Event, EventBus};
use crate::inspect::FileInspector;
use crate::metrics::REGISTRATIONS;
use crate::orchestrator::SkipReason;

use super::types::{
    ConversionStatus, FileEntry, FileId, RegistryError, RegistryNotice, RegistryState, UNSELECTED,
};

#[derive(Debug, Default)]
struct RegistryInner {
    /// Entries in registration order.
    entries: Vec<FileEntry>,
    next_id: u64,
    state: RegistryState,
    notice: Option<RegistryNotice>,
}

impl RegistryInner {
    fn position(&self, id: FileId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: FileId) -> Option<&mut FileEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Applies the `Populated -> Empty` transition if nothing is left.
    /// Returns true when the transition happened.
    fn reset_if_empty(&mut self) -> bool {
        if self.entries.is_empty() && self.state == RegistryState::Populated {
            self.state = RegistryState::Empty;
            self.notice = None;
            return true;
        }
        false
    }
}

/// Owns registered files and their per-file conversion metadata.
///
/// Status fields are written only by the orchestrator (through the
/// crate-private `begin_conversion` / `apply_status` / `apply_failure`);
/// everything else is driven by user actions.
pub struct FileRegistry {
    capabilities: Arc<CapabilityTable>,
    inspector: Arc<dyn FileInspector>,
    events: EventBus,
    inner: RwLock<RegistryInner>,
}

impl FileRegistry {
    pub fn new(
        capabilities: Arc<CapabilityTable>,
        inspector: Arc<dyn FileInspector>,
        events: EventBus,
    ) -> Self {
        Self {
            capabilities,
            inspector,
            events,
            inner: RwLock::new(RegistryInner {
                next_id: 1,
                ..RegistryInner::default()
            }),
        }
    }

    /// Hands out ids starting at `first`. Ids below it belong to earlier runs.
    pub fn starting_at(self, first: u64) -> Self {
        self.write().next_id = first.max(1);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Registers a file for conversion.
    ///
    /// Unsupported files are not added; the rejection is kept as the
    /// registry-scoped notice and the registry stays usable.
    pub async fn register(&self, path: impl AsRef<Path>) -> Result<FileEntry, RegistryError> {
        let path = path.as_ref();

        let details = match self.inspector.inspect(path).await {
            Ok(details) => details,
            Err(e) => {
                let err = RegistryError::from(e);
                self.reject(path, &err);
                return Err(err);
            }
        };

        let extension = normalize_extension(&details.file_extension);
        let file_type = self.capabilities.classify(&extension);

        if !self.capabilities.is_known_type(&file_type)
            || !self.capabilities.is_supported_input(&file_type, &extension)
        {
            let err = RegistryError::UnsupportedType {
                extension,
                file_type,
            };
            self.reject(path, &err);
            return Err(err);
        }

        let convertibles = self.capabilities.convertible_outputs(&file_type, &extension);

        let entry = {
            let mut inner = self.write();
            let id = FileId::new(inner.next_id);
            inner.next_id += 1;

            let entry = FileEntry {
                id,
                dir_path: details.dir_path,
                full_file_name: details.full_file_name,
                file_name: details.file_name,
                file_extension: extension,
                file_type,
                full_path: details.full_path,
                selected_extension: UNSELECTED.to_string(),
                convertibles,
                conversion_status: ConversionStatus::Idle,
                progress: None,
                error: None,
                is_supported: true,
            };

            inner.entries.push(entry.clone());
            inner.state = RegistryState::Populated;
            inner.notice = None;
            entry
        };

        REGISTRATIONS.with_label_values(&["accepted"]).inc();
        info!(
            "Registered file {} ({}) as {}",
            entry.id,
            entry.full_path.display(),
            entry.file_type
        );
        self.events.publish(Event::FileRegistered {
            id: entry.id,
            path: entry.full_path.clone(),
            file_type: entry.file_type.clone(),
        });

        Ok(entry)
    }

    fn reject(&self, path: &Path, err: &RegistryError) {
        REGISTRATIONS.with_label_values(&["rejected"]).inc();
        warn!("Rejected registration of {}: {}", path.display(), err);
        self.write().notice = Some(RegistryNotice {
            message: err.to_string(),
            path: path.to_path_buf(),
            at: Utc::now(),
        });
        self.events.publish(Event::RegistrationRejected {
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }

    /// Picks the output extension of an at-rest file.
    pub fn set_target(&self, id: FileId, extension: &str) -> Result<FileEntry, RegistryError> {
        let extension = normalize_extension(extension);

        let entry = {
            let mut inner = self.write();
            let entry = inner.entry_mut(id).ok_or(RegistryError::NotFound(id))?;

            if entry.conversion_status.is_active() {
                return Err(RegistryError::InvalidTarget {
                    id,
                    extension,
                    reason: format!("file is {}", entry.conversion_status),
                });
            }
            if !entry.convertibles.contains(&extension) {
                return Err(RegistryError::InvalidTarget {
                    id,
                    extension,
                    reason: format!("not a valid output for {}", entry.file_type),
                });
            }

            entry.selected_extension = extension.clone();
            entry.clone()
        };

        debug!("File {} target set to {}", id, extension);
        self.events.publish(Event::TargetSelected { id, extension });
        Ok(entry)
    }

    /// Deletes an at-rest entry. Queued or processing entries are refused.
    pub fn remove(&self, id: FileId) -> Result<FileEntry, RegistryError> {
        let (entry, reset) = {
            let mut inner = self.write();
            let pos = inner.position(id).ok_or(RegistryError::NotFound(id))?;
            if inner.entries[pos].conversion_status.is_active() {
                return Err(RegistryError::Active(id));
            }
            let entry = inner.entries.remove(pos);
            (entry, inner.reset_if_empty())
        };

        info!("Removed file {} ({})", id, entry.full_path.display());
        self.events.publish(Event::FileRemoved { id });
        if reset {
            self.events.publish(Event::RegistryReset);
        }
        Ok(entry)
    }

    /// Removes every entry. Refused while any entry is queued or processing.
    pub fn clear(&self) -> Result<usize, RegistryError> {
        let (removed, reset) = {
            let mut inner = self.write();
            if let Some(active) = inner.entries.iter().find(|e| e.conversion_status.is_active()) {
                return Err(RegistryError::Active(active.id));
            }
            let removed: Vec<FileId> = inner.entries.drain(..).map(|e| e.id).collect();
            (removed, inner.reset_if_empty())
        };

        for id in &removed {
            self.events.publish(Event::FileRemoved { id: *id });
        }
        if reset {
            self.events.publish(Event::RegistryReset);
        }
        info!("Cleared {} files from registry", removed.len());
        Ok(removed.len())
    }

    pub fn list(&self) -> Vec<FileEntry> {
        self.read().entries.clone()
    }

    pub fn get(&self, id: FileId) -> Option<FileEntry> {
        self.read().entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn state(&self) -> RegistryState {
        self.read().state
    }

    /// Last registration rejection, cleared by a successful registration or
    /// by the registry becoming empty.
    pub fn notice(&self) -> Option<RegistryNotice> {
        self.read().notice.clone()
    }

    pub fn ids_with_status(&self, status: ConversionStatus) -> Vec<FileId> {
        self.read()
            .entries
            .iter()
            .filter(|e| e.conversion_status == status)
            .map(|e| e.id)
            .collect()
    }

    /// Validates a file for conversion and marks it queued in one step.
    pub(crate) fn begin_conversion(&self, id: FileId) -> Result<FileEntry, SkipReason> {
        let mut inner = self.write();
        let entry = inner.entry_mut(id).ok_or(SkipReason::NotFound)?;

        if !entry.is_supported {
            return Err(SkipReason::Unsupported);
        }
        if !entry.has_target() {
            return Err(SkipReason::NoTarget);
        }
        if entry.conversion_status.is_active() {
            return Err(SkipReason::AlreadyActive);
        }

        entry.conversion_status = ConversionStatus::Queued;
        entry.progress = None;
        entry.error = None;
        Ok(entry.clone())
    }

    /// Sets the status of an entry. Unknown ids are ignored.
    ///
    /// Progress is kept only while processing and is clamped to 0..=100.
    pub(crate) fn apply_status(
        &self,
        id: FileId,
        status: ConversionStatus,
        progress: Option<u8>,
    ) -> bool {
        let mut inner = self.write();
        let Some(entry) = inner.entry_mut(id) else {
            return false;
        };

        entry.conversion_status = status;
        entry.progress = match status {
            ConversionStatus::Processing => Some(progress.unwrap_or(0).min(100)),
            _ => None,
        };
        if status != ConversionStatus::Failed {
            entry.error = None;
        }
        true
    }

    /// Marks an entry failed with a reason. Unknown ids are ignored.
    pub(crate) fn apply_failure(&self, id: FileId, reason: &str) -> bool {
        let mut inner = self.write();
        let Some(entry) = inner.entry_mut(id) else {
            return false;
        };
        entry.conversion_status = ConversionStatus::Failed;
        entry.progress = None;
        entry.error = Some(reason.to_string());
        true
    }

}
