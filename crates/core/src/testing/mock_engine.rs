//! Mock conversion engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock, Semaphore};

use crate::engine::{
    ConversionEngine, ConversionJob, ConversionOutcome, ConversionProgress, EngineError,
};

#[derive(Debug, Default)]
struct Counters {
    running: AtomicUsize,
    peak: AtomicUsize,
    aborted: AtomicUsize,
}

/// Tracks one running conversion; a guard dropped before `finish` counts as aborted.
struct RunGuard {
    counters: Arc<Counters>,
    finished: bool,
}

impl RunGuard {
    fn enter(counters: &Arc<Counters>) -> Self {
        let now = counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            counters: Arc::clone(counters),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.counters.running.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Mock implementation of the ConversionEngine trait.
///
/// Provides controllable behavior for testing:
/// - Track submitted jobs for assertions
/// - Simulate success/failure, globally or per input path
/// - Hold conversions behind a gate until the test releases them
/// - Simulate progress updates
///
/// Nothing is written to disk.
///
/// # Example
///
/// ```rust,ignore
/// use convertino_core::testing::MockEngine;
///
/// let engine = MockEngine::new();
/// engine.hold().await;
///
/// // ... start jobs, they stay processing ...
///
/// engine.release(1).await;
/// assert_eq!(engine.job_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockEngine {
    /// Jobs in the order they reached the engine.
    jobs: Arc<RwLock<Vec<ConversionJob>>>,
    /// Failure reasons by input path.
    failures: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// If set, the next conversion will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<RwLock<u64>>,
    /// Number of progress updates sent per conversion.
    progress_steps: Arc<RwLock<u32>>,
    /// When set, conversions wait for a permit before finishing.
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    /// When set, `validate` reports the binary missing at this path.
    missing_binary: Arc<RwLock<Option<PathBuf>>>,
    counters: Arc<Counters>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            conversion_duration_ms: Arc::new(RwLock::new(10)),
            progress_steps: Arc::new(RwLock::new(2)),
            gate: Arc::new(RwLock::new(None)),
            missing_binary: Arc::new(RwLock::new(None)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get all jobs submitted so far.
    pub async fn recorded_jobs(&self) -> Vec<ConversionJob> {
        self.jobs.read().await.clone()
    }

    /// Get the number of jobs submitted so far.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Wait until at least `count` jobs were submitted. Gives up after five seconds.
    pub async fn wait_for_jobs(&self, count: usize) -> bool {
        for _ in 0..500 {
            if self.job_count().await >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Make `validate` fail as if FFmpeg were missing at `path`.
    pub async fn set_missing_binary(&self, path: impl Into<PathBuf>) {
        *self.missing_binary.write().await = Some(path.into());
    }

    pub async fn clear_missing_binary(&self) {
        *self.missing_binary.write().await = None;
    }

    /// Set how many progress updates each conversion sends.
    pub async fn set_progress_steps(&self, steps: u32) {
        *self.progress_steps.write().await = steps;
    }

    /// Configure the next conversion to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every conversion of `path` fail with `reason`.
    pub async fn fail_path(&self, path: impl AsRef<Path>, reason: &str) {
        self.failures
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), reason.to_string());
    }

    /// Hold conversions until released.
    pub async fn hold(&self) {
        *self.gate.write().await = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held conversions finish.
    pub async fn release(&self, count: usize) {
        if let Some(gate) = self.gate.read().await.as_ref() {
            gate.add_permits(count);
        }
    }

    /// Let every held and future conversion finish.
    pub async fn release_all(&self) {
        if let Some(gate) = self.gate.write().await.take() {
            gate.close();
        }
    }

    /// Conversions currently running.
    pub fn running_count(&self) -> usize {
        self.counters.running.load(Ordering::SeqCst)
    }

    /// Highest number of conversions that ran at once.
    pub fn peak_running(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Conversions dropped before they finished.
    pub fn aborted_count(&self) -> usize {
        self.counters.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(
        &self,
        job: ConversionJob,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<ConversionOutcome, EngineError> {
        self.jobs.write().await.push(job.clone());
        let mut guard = RunGuard::enter(&self.counters);

        let duration_ms = *self.conversion_duration_ms.read().await;
        let steps = *self.progress_steps.read().await;

        if steps == 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        } else {
            let step = Duration::from_millis(duration_ms / u64::from(steps));
            for i in 1..=steps {
                let _ = progress_tx
                    .send(ConversionProgress {
                        job_id: job.job_id,
                        percent: i as f32 / steps as f32 * 100.0,
                        time_secs: step.as_secs_f64() * f64::from(i),
                        duration_secs: Some(duration_ms as f64 / 1000.0),
                        speed: Some("1x".to_string()),
                    })
                    .await;
                tokio::time::sleep(step).await;
            }
        }

        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            // A closed gate lets everything through.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        guard.finish();

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(reason) = self.failures.read().await.get(&job.input_path) {
            return Err(EngineError::conversion_failed(reason.clone(), None));
        }

        Ok(ConversionOutcome {
            job_id: job.job_id,
            output_path: job.output_path(),
            output_size_bytes: 1024,
            elapsed_ms: duration_ms,
        })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        match self.missing_binary.read().await.clone() {
            Some(path) => Err(EngineError::FfmpegNotFound { path }),
            None => Ok(()),
        }
    }
}
