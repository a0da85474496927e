pub mod capabilities;
pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod inspect;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod settings;
pub mod testing;

pub use capabilities::{
    load_capabilities, CapabilityError, CapabilityTable, ExtensionInfo, LogicalType,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use context::{ContextError, ContextParts, ConversionContext};
pub use engine::{
    ConversionEngine, ConversionJob, ConversionOutcome, ConversionProgress, EngineConfig,
    EngineError, EngineStatus, FfmpegEngine, ResultOpener, SystemOpener,
};
pub use events::{Event, EventBus, EventEnvelope};
pub use inspect::{FileDetails, FileInspector, FsInspector, InspectError};
pub use ledger::{CompletedJob, JobLedger, LedgerError, MemoryLedger, SqliteLedger};
pub use orchestrator::{
    BatchReport, ConversionOrchestrator, JobHandle, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus, SkipReason, SkippedJob,
};
pub use registry::{
    ConversionStatus, FileEntry, FileId, FileRegistry, RegistryError, RegistryNotice,
    RegistryState,
};
pub use settings::{ConversionMode, Settings, SettingsError, SettingsStore};
