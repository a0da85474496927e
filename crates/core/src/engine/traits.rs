//! Trait definitions for the conversion engine.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::EngineError;
use super::types::{ConversionJob, ConversionOutcome, ConversionProgress};

/// An out-of-process converter.
///
/// The orchestrator runs `convert` in a spawned task and cancels it by
/// dropping the future, so implementations must release their external
/// resources (child processes, partial files) on drop.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Converts a file, sending progress updates as it goes.
    ///
    /// If the progress receiver is dropped, conversion continues without
    /// progress reporting.
    async fn convert(
        &self,
        job: ConversionJob,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<ConversionOutcome, EngineError>;

    /// Validates that the engine is properly configured and ready.
    async fn validate(&self) -> Result<(), EngineError>;
}
