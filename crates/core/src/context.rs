//! Application context.
//!
//! Owns every core component and exposes the operations the outer shell
//! (HTTP API, tests) drives. Built once at startup and passed around
//! explicitly.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::capabilities::{load_capabilities, CapabilityError, CapabilityTable, ExtensionInfo};
use crate::config::Config;
use crate::engine::{
    ConversionEngine, EngineStatus, FfmpegEngine, NoopOpener, ResultOpener, SystemOpener,
};
use crate::events::{Event, EventBus, EventEnvelope};
use crate::inspect::{FileInspector, FsInspector};
use crate::ledger::{CompletedJob, JobLedger, LedgerError, MemoryLedger, SqliteLedger};
use crate::orchestrator::{
    BatchReport, ConversionOrchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus,
};
use crate::registry::{
    FileEntry, FileId, FileRegistry, RegistryError, RegistryNotice, RegistryState,
};
use crate::settings::{Settings, SettingsError, SettingsStore};

/// Errors raised while building the context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to load capabilities: {0}")]
    Capabilities(#[from] CapabilityError),

    #[error("Failed to load settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to open ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/// Components a context is assembled from.
pub struct ContextParts {
    pub capabilities: CapabilityTable,
    pub inspector: Arc<dyn FileInspector>,
    pub engine: Arc<dyn ConversionEngine>,
    pub ledger: Arc<dyn JobLedger>,
    pub settings: SettingsStore,
    pub opener: Arc<dyn ResultOpener>,
    pub events: EventBus,
    pub orchestrator: OrchestratorConfig,
}

impl ContextParts {
    /// In-memory parts around the given engine and inspector.
    pub fn in_memory(engine: Arc<dyn ConversionEngine>, inspector: Arc<dyn FileInspector>) -> Self {
        Self {
            capabilities: CapabilityTable::builtin(),
            inspector,
            engine,
            ledger: Arc::new(MemoryLedger::new()),
            settings: SettingsStore::in_memory(Settings::default()),
            opener: Arc::new(NoopOpener),
            events: EventBus::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = SettingsStore::in_memory(settings);
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn JobLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn ResultOpener>) -> Self {
        self.opener = opener;
        self
    }
}

/// The running application: registry, settings, ledger and orchestrator.
pub struct ConversionContext {
    capabilities: Arc<CapabilityTable>,
    registry: Arc<FileRegistry>,
    settings: Arc<SettingsStore>,
    ledger: Arc<dyn JobLedger>,
    orchestrator: ConversionOrchestrator,
    engine: Arc<dyn ConversionEngine>,
    engine_status: RwLock<EngineStatus>,
    events: EventBus,
}

impl ConversionContext {
    /// Build the production context described by `config` and start it.
    pub async fn from_config(config: &Config) -> Result<Self, ContextError> {
        let capabilities = match &config.capabilities.path {
            Some(path) => {
                info!("Loading capability table from {}", path.display());
                load_capabilities(path)?
            }
            None => CapabilityTable::builtin(),
        };

        let settings = SettingsStore::load(&config.settings.path).await?;

        let ledger: Arc<dyn JobLedger> = match &config.ledger.path {
            Some(path) => {
                info!("Recording completed jobs in {}", path.display());
                Arc::new(SqliteLedger::new(path)?)
            }
            None => Arc::new(MemoryLedger::new()),
        };

        let parts = ContextParts {
            capabilities,
            inspector: Arc::new(FsInspector),
            engine: Arc::new(FfmpegEngine::new(config.engine.clone())),
            ledger,
            settings,
            opener: Arc::new(SystemOpener),
            events: EventBus::new(config.events.capacity),
            orchestrator: config.orchestrator.clone(),
        };

        Ok(Self::new(parts).await)
    }

    /// Assemble a context from parts, validate the engine and start the
    /// orchestrator.
    ///
    /// File ids continue after the highest id in the ledger, so history from
    /// earlier runs is never attributed to a new file.
    pub async fn new(parts: ContextParts) -> Self {
        let capabilities = Arc::new(parts.capabilities);
        let settings = Arc::new(parts.settings);

        let first_id = match parts.ledger.max_file_id() {
            Ok(max) => max.map_or(1, |id| id.get() + 1),
            Err(e) => {
                warn!("Could not read the last file id from the ledger: {}", e);
                1
            }
        };
        let registry = Arc::new(
            FileRegistry::new(
                Arc::clone(&capabilities),
                parts.inspector,
                parts.events.clone(),
            )
            .starting_at(first_id),
        );

        let orchestrator = ConversionOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&settings),
            Arc::clone(&parts.ledger),
            Arc::clone(&parts.engine),
            parts.events.clone(),
            parts.orchestrator,
        )
        .with_opener(parts.opener);

        let unchecked = EngineStatus {
            name: parts.engine.name().to_string(),
            ready: false,
            error: None,
            checked_at: chrono::Utc::now(),
        };
        let context = Self {
            capabilities,
            registry,
            settings,
            ledger: parts.ledger,
            orchestrator,
            engine: parts.engine,
            engine_status: RwLock::new(unchecked),
            events: parts.events,
        };

        context.check_engine().await;
        context.orchestrator.start().await;
        context
    }

    /// Stop the orchestrator; queued and processing jobs are cancelled.
    pub async fn shutdown(&self) {
        self.orchestrator.stop().await;
    }

    // Files

    pub async fn register_file(&self, path: impl AsRef<Path>) -> Result<FileEntry, RegistryError> {
        self.registry.register(path).await
    }

    pub fn set_target(&self, id: FileId, extension: &str) -> Result<FileEntry, RegistryError> {
        self.registry.set_target(id, extension)
    }

    /// Remove a file, cancelling its job first if it is active.
    pub async fn remove_file(&self, id: FileId) -> Result<FileEntry, OrchestratorError> {
        self.orchestrator.remove(id).await
    }

    /// Cancel every job and empty the registry.
    pub async fn delete_all(&self) -> Result<usize, OrchestratorError> {
        self.orchestrator.delete_all().await
    }

    pub fn files(&self) -> Vec<FileEntry> {
        self.registry.list()
    }

    pub fn file(&self, id: FileId) -> Option<FileEntry> {
        self.registry.get(id)
    }

    pub fn registry_state(&self) -> RegistryState {
        self.registry.state()
    }

    /// Last rejected registration, if any.
    pub fn notice(&self) -> Option<RegistryNotice> {
        self.registry.notice()
    }

    // Jobs

    pub async fn start(&self, ids: Vec<FileId>) -> Result<BatchReport, OrchestratorError> {
        self.orchestrator.start_batch(ids).await
    }

    /// Start every at-rest file that has a target selected.
    pub async fn start_all(&self) -> Result<BatchReport, OrchestratorError> {
        let ids = self
            .registry
            .list()
            .into_iter()
            .filter(|e| e.has_target() && !e.conversion_status.is_active())
            .map(|e| e.id)
            .collect();
        self.orchestrator.start_batch(ids).await
    }

    pub async fn cancel(&self, id: FileId) -> Result<bool, OrchestratorError> {
        self.orchestrator.cancel(id).await
    }

    pub async fn cancel_all(&self) -> Result<usize, OrchestratorError> {
        self.orchestrator.cancel_all().await
    }

    pub async fn status(&self) -> OrchestratorStatus {
        self.orchestrator.status().await
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Result of the most recent engine check.
    pub fn engine_status(&self) -> EngineStatus {
        self.engine_status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate the engine again and record the result.
    ///
    /// While the engine is not ready, conversions still dispatch and fail
    /// one by one with the engine's error.
    pub async fn check_engine(&self) -> EngineStatus {
        let result = self.engine.validate().await;
        if let Err(e) = &result {
            warn!("Conversion engine {} is not ready: {}", self.engine.name(), e);
        }
        let status = EngineStatus::from_check(self.engine.name(), result);
        *self
            .engine_status
            .write()
            .unwrap_or_else(PoisonError::into_inner) = status.clone();
        self.events.publish(Event::EngineChecked {
            ready: status.ready,
            error: status.error.clone(),
        });
        status
    }

    // Completed jobs

    pub fn completed_jobs(&self) -> Result<Vec<CompletedJob>, LedgerError> {
        self.ledger.list()
    }

    pub fn completed_jobs_for(&self, id: FileId) -> Result<Vec<CompletedJob>, LedgerError> {
        self.ledger.for_file(id)
    }

    pub fn clear_completed(&self) -> Result<usize, LedgerError> {
        let removed = self.ledger.clear()?;
        info!("Cleared {} completed jobs", removed);
        Ok(removed)
    }

    // Settings

    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    /// Apply and persist new settings. A higher concurrency limit takes
    /// effect immediately; a lower one never preempts running jobs.
    pub async fn update_settings(&self, settings: Settings) -> Settings {
        let applied = self.settings.update(settings).await;
        self.events.publish(Event::SettingsChanged {
            settings: applied.clone(),
        });
        applied
    }

    // Capabilities and events

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn describe(&self, extension: &str) -> ExtensionInfo {
        self.capabilities.describe(extension)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConversionStatus;
    use crate::testing::{MockEngine, MockInspector};
    use std::time::Duration;

    async fn create_context() -> (ConversionContext, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        let parts = ContextParts::in_memory(engine.clone(), Arc::new(MockInspector::new()));
        (ConversionContext::new(parts).await, engine)
    }

    async fn wait_for_status(ctx: &ConversionContext, id: FileId, status: ConversionStatus) {
        for _ in 0..500 {
            if ctx.file(id).map(|e| e.conversion_status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("file {} never reached {}", id, status);
    }

    #[tokio::test]
    async fn test_convert_single_file() {
        let (ctx, _engine) = create_context().await;

        let entry = ctx.register_file("/media/a.mov").await.unwrap();
        ctx.set_target(entry.id, "mp4").unwrap();
        let report = ctx.start(vec![entry.id]).await.unwrap();
        assert_eq!(report.queued, vec![entry.id]);

        wait_for_status(&ctx, entry.id, ConversionStatus::Success).await;

        let completed = ctx.completed_jobs().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].new_file_path.to_str().unwrap().ends_with(".mp4"));
        assert_eq!(ctx.completed_jobs_for(entry.id).unwrap().len(), 1);
        assert_eq!(ctx.clear_completed().unwrap(), 1);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_all_only_picks_files_with_targets() {
        let (ctx, engine) = create_context().await;
        engine.hold().await;

        let a = ctx.register_file("/media/a.mov").await.unwrap();
        let _b = ctx.register_file("/media/b.mov").await.unwrap();
        ctx.set_target(a.id, "webm").unwrap();

        let report = ctx.start_all().await.unwrap();
        assert_eq!(report.queued, vec![a.id]);
        assert!(report.skipped.is_empty());

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_settings_publishes_event() {
        let (ctx, _engine) = create_context().await;
        let mut rx = ctx.subscribe();

        let applied = ctx
            .update_settings(Settings::default().with_max_concurrency(0))
            .await;
        assert_eq!(applied.max_concurrency, 1);
        assert_eq!(ctx.settings().max_concurrency, 1);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.kind(), "settings_changed");

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_engine_status_follows_validation() {
        let engine = Arc::new(MockEngine::new());
        engine.set_missing_binary("/opt/ffmpeg/bin/ffmpeg").await;
        let parts = ContextParts::in_memory(engine.clone(), Arc::new(MockInspector::new()));
        let ctx = ConversionContext::new(parts).await;

        let status = ctx.engine_status();
        assert_eq!(status.name, "mock");
        assert!(!status.ready);
        assert!(status.error.unwrap().contains("/opt/ffmpeg/bin/ffmpeg"));

        engine.clear_missing_binary().await;
        let mut rx = ctx.subscribe();
        assert!(ctx.check_engine().await.ready);
        assert!(ctx.engine_status().ready);
        assert_eq!(
            rx.recv().await.unwrap().event,
            Event::EngineChecked {
                ready: true,
                error: None
            }
        );

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_describe_and_notice() {
        let (ctx, _engine) = create_context().await;

        assert_eq!(ctx.describe("MOV").logical_type.as_str(), "video");
        assert!(ctx.register_file("/media/notes.txt").await.is_err());
        assert!(ctx.notice().is_some());
        assert_eq!(ctx.registry_state(), RegistryState::Empty);
        assert_eq!(ctx.engine_name(), "mock");

        ctx.shutdown().await;
        assert!(!ctx.is_running());
    }
}
