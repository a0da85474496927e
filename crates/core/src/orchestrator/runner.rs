//! Conversion orchestrator implementation.
//!
//! A single scheduler task owns the pending queue, the active map and the
//! in-flight dispatches. Public methods talk to it over an `mpsc` command
//! channel and wait for a `oneshot` reply. Engine work runs in spawned
//! tasks that report back through the same channel.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{
    ConversionEngine, ConversionJob, ConversionOutcome, EncoderParams, EngineError, NoopOpener,
    ResultOpener,
};
use crate::events::{Event, EventBus};
use crate::ledger::{CompletedJob, JobLedger};
use crate::metrics::{
    JOBS_DISPATCHED, JOBS_FINISHED, JOBS_PROCESSING, JOBS_QUEUED, JOB_DURATION, STALE_RESULTS,
};
use crate::registry::{ConversionStatus, FileEntry, FileId, FileRegistry, RegistryError};
use crate::settings::{Settings, SettingsStore};

use super::config::OrchestratorConfig;
use super::types::{
    BatchReport, BatchSummary, JobHandle, OrchestratorError, OrchestratorStatus, SkippedJob,
};

/// Messages handled by the scheduler task.
enum Command {
    Start {
        ids: Vec<FileId>,
        reply: oneshot::Sender<BatchReport>,
    },
    Cancel {
        id: FileId,
        reply: oneshot::Sender<bool>,
    },
    CancelAll {
        reply: oneshot::Sender<usize>,
    },
    Remove {
        id: FileId,
        reply: oneshot::Sender<Result<FileEntry, RegistryError>>,
    },
    DeleteAll {
        reply: oneshot::Sender<Result<usize, RegistryError>>,
    },
    Status {
        reply: oneshot::Sender<OrchestratorStatus>,
    },
    Progress {
        handle: JobHandle,
        percent: u8,
    },
    Finished {
        handle: JobHandle,
        result: Result<ConversionOutcome, EngineError>,
    },
    Shutdown,
}

/// Drives registered files through the engine with bounded concurrency.
pub struct ConversionOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<FileRegistry>,
    settings: Arc<SettingsStore>,
    ledger: Arc<dyn JobLedger>,
    engine: Arc<dyn ConversionEngine>,
    events: EventBus,
    opener: Arc<dyn ResultOpener>,

    // Runtime state
    running: AtomicBool,
    commands: mpsc::Sender<Command>,
    receiver: Mutex<Option<mpsc::Receiver<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConversionOrchestrator {
    /// Create a new orchestrator. Call [`start`](Self::start) before use.
    pub fn new(
        registry: Arc<FileRegistry>,
        settings: Arc<SettingsStore>,
        ledger: Arc<dyn JobLedger>,
        engine: Arc<dyn ConversionEngine>,
        events: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        let (commands, receiver) = mpsc::channel(config.command_buffer.max(1));

        Self {
            config,
            registry,
            settings,
            ledger,
            engine,
            events,
            opener: Arc::new(NoopOpener),
            running: AtomicBool::new(false),
            commands,
            receiver: Mutex::new(Some(receiver)),
            task: Mutex::new(None),
        }
    }

    /// Use `opener` to show outputs when `open_when_finished` is set.
    pub fn with_opener(mut self, opener: Arc<dyn ResultOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the scheduler task.
    ///
    /// The orchestrator runs at most once; starting it again after
    /// [`stop`](Self::stop) is refused.
    pub async fn start(&self) {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(receiver) = receiver else {
            warn!("Orchestrator already started");
            return;
        };

        info!(
            "Starting conversion orchestrator with {} engine",
            self.engine.name()
        );

        let scheduler = Scheduler {
            registry: Arc::clone(&self.registry),
            settings: Arc::clone(&self.settings),
            ledger: Arc::clone(&self.ledger),
            engine: Arc::clone(&self.engine),
            events: self.events.clone(),
            opener: Arc::clone(&self.opener),
            commands: self.commands.downgrade(),
            progress_buffer: self.config.progress_buffer.max(1),
            pending: VecDeque::new(),
            active: HashMap::new(),
            in_flight: HashMap::new(),
            tally: BatchSummary::default(),
        };

        let settings_rx = self.settings.subscribe();
        let task = tokio::spawn(scheduler.run(receiver, settings_rx));

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        self.running.store(true, Ordering::SeqCst);
    }

    /// Stop the scheduler, cancelling every queued and processing job.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping conversion orchestrator");

        if self.commands.send(Command::Shutdown).await.is_err() {
            warn!("Scheduler exited before shutdown was requested");
        }

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Scheduler task failed: {}", e);
            }
        }

        info!("Conversion orchestrator stopped");
    }

    /// Queue files for conversion. Ineligible ids are skipped and reported.
    pub async fn start_batch(&self, ids: Vec<FileId>) -> Result<BatchReport, OrchestratorError> {
        self.request(|reply| Command::Start { ids, reply }).await
    }

    /// Cancel one queued or processing job. Returns false if it was not active.
    pub async fn cancel(&self, id: FileId) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::Cancel { id, reply }).await
    }

    /// Cancel every queued and processing job. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> Result<usize, OrchestratorError> {
        self.request(|reply| Command::CancelAll { reply }).await
    }

    /// Cancel the file's job if active, then remove it from the registry.
    pub async fn remove(&self, id: FileId) -> Result<FileEntry, OrchestratorError> {
        let removed = self.request(|reply| Command::Remove { id, reply }).await?;
        Ok(removed?)
    }

    /// Cancel everything, then clear the registry.
    pub async fn delete_all(&self) -> Result<usize, OrchestratorError> {
        let cleared = self.request(|reply| Command::DeleteAll { reply }).await?;
        Ok(cleared?)
    }

    /// Snapshot of the scheduler.
    pub async fn status(&self) -> OrchestratorStatus {
        match self.request(|reply| Command::Status { reply }).await {
            Ok(status) => status,
            Err(_) => OrchestratorStatus {
                running: false,
                limit: self.settings.current().max_concurrency,
                ..OrchestratorStatus::default()
            },
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        if !self.is_running() {
            return Err(OrchestratorError::NotRunning);
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| OrchestratorError::NotRunning)?;
        response.await.map_err(|_| OrchestratorError::NotRunning)
    }
}

/// Bookkeeping for a file owned by the scheduler.
enum ActiveJob {
    Queued,
    Processing {
        handle: JobHandle,
        abort: oneshot::Sender<()>,
    },
}

/// A dispatch the scheduler is still waiting on.
struct InFlight {
    file_id: FileId,
    input_path: PathBuf,
    started_at: Instant,
}

struct Scheduler {
    registry: Arc<FileRegistry>,
    settings: Arc<SettingsStore>,
    ledger: Arc<dyn JobLedger>,
    engine: Arc<dyn ConversionEngine>,
    events: EventBus,
    opener: Arc<dyn ResultOpener>,
    commands: mpsc::WeakSender<Command>,
    progress_buffer: usize,

    /// Queued files in enqueue order.
    pending: VecDeque<FileId>,
    active: HashMap<FileId, ActiveJob>,
    in_flight: HashMap<JobHandle, InFlight>,
    /// Terminal outcomes since the active set was last empty.
    tally: BatchSummary,
}

impl Scheduler {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut settings_rx: watch::Receiver<Settings>,
    ) {
        debug!("Conversion scheduler started");
        let mut settings_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle(command).await,
                    }
                }
                changed = settings_rx.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                    let limit = settings_rx.borrow_and_update().max_concurrency;
                    debug!("Concurrency limit is now {}", limit);
                    self.promote();
                    self.check_batch_finished();
                }
            }
            self.update_gauges();
        }

        let cancelled = self.cancel_all();
        if cancelled > 0 {
            info!("Cancelled {} jobs on shutdown", cancelled);
        }
        self.check_batch_finished();
        self.update_gauges();
        debug!("Conversion scheduler stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start { ids, reply } => {
                let report = self.enqueue(ids);
                self.promote();
                self.check_batch_finished();
                let _ = reply.send(report);
            }
            Command::Cancel { id, reply } => {
                let cancelled = self.cancel_one(id);
                if cancelled {
                    self.promote();
                    self.check_batch_finished();
                }
                let _ = reply.send(cancelled);
            }
            Command::CancelAll { reply } => {
                let count = self.cancel_all();
                self.check_batch_finished();
                let _ = reply.send(count);
            }
            Command::Remove { id, reply } => {
                if self.cancel_one(id) {
                    self.promote();
                    self.check_batch_finished();
                }
                let _ = reply.send(self.registry.remove(id));
            }
            Command::DeleteAll { reply } => {
                self.cancel_all();
                self.check_batch_finished();
                let _ = reply.send(self.registry.clear());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Progress { handle, percent } => self.on_progress(handle, percent),
            Command::Finished { handle, result } => {
                self.on_finished(handle, result).await;
                self.promote();
                self.check_batch_finished();
            }
            Command::Shutdown => {}
        }
    }

    /// Files of one request share an enqueue time; they queue in id order.
    fn enqueue(&mut self, mut ids: Vec<FileId>) -> BatchReport {
        let mut report = BatchReport::default();
        ids.sort();

        for id in ids {
            match self.registry.begin_conversion(id) {
                Ok(_) => {
                    self.active.insert(id, ActiveJob::Queued);
                    self.pending.push_back(id);
                    report.queued.push(id);
                    self.events.publish(Event::JobQueued { id });
                }
                Err(reason) => {
                    debug!("Skipping file {}: {}", id, reason);
                    report.skipped.push(SkippedJob { id, reason });
                    self.events.publish(Event::JobSkipped { id, reason });
                }
            }
        }

        if !report.queued.is_empty() {
            info!(
                "Queued {} files ({} skipped)",
                report.queued.len(),
                report.skipped.len()
            );
        }
        report
    }

    /// Fill free slots from the front of the queue.
    fn promote(&mut self) {
        let limit = self.settings.current().max_concurrency.max(1);
        while self.in_flight.len() < limit {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            self.dispatch(id);
        }
    }

    fn dispatch(&mut self, id: FileId) {
        let Some(entry) = self.registry.get(id) else {
            warn!("Queued file {} vanished from the registry", id);
            self.active.remove(&id);
            return;
        };

        let Some(commands) = self.commands.upgrade() else {
            self.active.remove(&id);
            self.fail(id, "orchestrator stopped".to_string(), None);
            return;
        };

        let settings = self.settings.current();
        let handle = JobHandle::new();
        let (abort_tx, abort_rx) = oneshot::channel();

        let job = ConversionJob {
            job_id: handle,
            file_id: id,
            input_path: entry.full_path.clone(),
            output_extension: entry.selected_extension.clone(),
            media_type: entry.file_type.clone(),
            encoder: EncoderParams::from(&settings),
        };

        self.registry
            .apply_status(id, ConversionStatus::Processing, Some(0));
        self.active.insert(
            id,
            ActiveJob::Processing {
                handle,
                abort: abort_tx,
            },
        );
        self.in_flight.insert(
            handle,
            InFlight {
                file_id: id,
                input_path: entry.full_path,
                started_at: Instant::now(),
            },
        );

        JOBS_DISPATCHED.inc();
        info!(
            "Converting file {} to {} (job {}, {} mode)",
            id, job.output_extension, handle, settings.conversion_mode
        );
        self.events.publish(Event::JobStarted { id, handle });

        tokio::spawn(run_job(
            Arc::clone(&self.engine),
            job,
            abort_rx,
            commands,
            self.progress_buffer,
        ));
    }

    fn on_progress(&mut self, handle: JobHandle, percent: u8) {
        let Some(flight) = self.in_flight.get(&handle) else {
            return;
        };
        let id = flight.file_id;
        let percent = percent.min(100);
        self.registry
            .apply_status(id, ConversionStatus::Processing, Some(percent));
        self.events.publish(Event::JobProgress { id, percent });
    }

    async fn on_finished(
        &mut self,
        handle: JobHandle,
        result: Result<ConversionOutcome, EngineError>,
    ) {
        let Some(flight) = self.in_flight.remove(&handle) else {
            STALE_RESULTS.inc();
            debug!("Discarding stale result for job {}", handle);
            return;
        };
        let id = flight.file_id;
        self.active.remove(&id);

        match result {
            Ok(outcome) => self.succeed(id, flight, outcome).await,
            Err(e) if e.is_cancelled() => {
                self.registry
                    .apply_status(id, ConversionStatus::Cancelled, None);
                self.record_cancelled(id);
            }
            Err(e) => self.fail(id, e.user_message(), Some(flight.started_at.elapsed())),
        }
    }

    async fn succeed(&mut self, id: FileId, flight: InFlight, outcome: ConversionOutcome) {
        let record = CompletedJob::new(
            id,
            Duration::from_millis(outcome.elapsed_ms),
            flight.input_path,
            outcome.output_path.clone(),
        );

        // Blocking I/O. The entry reads as successful only once it is recorded.
        let ledger = Arc::clone(&self.ledger);
        let pending = record.clone();
        match tokio::task::spawn_blocking(move || ledger.append(&pending)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to record completed job for file {}: {}", id, e),
            Err(e) => error!("Ledger write for file {} did not complete: {}", id, e),
        }

        self.registry.apply_status(id, ConversionStatus::Success, None);
        self.tally.succeeded += 1;
        JOBS_FINISHED.with_label_values(&["success"]).inc();
        JOB_DURATION
            .with_label_values(&["success"])
            .observe(record.total_time);

        info!(
            "Converted file {} to {} in {:.2}s",
            id,
            outcome.output_path.display(),
            record.total_time
        );
        self.events.publish(Event::JobCompleted { job: record });

        if self.settings.current().open_when_finished {
            let opener = Arc::clone(&self.opener);
            let path = outcome.output_path;
            tokio::spawn(async move {
                if let Err(e) = opener.open(&path).await {
                    warn!("Failed to open {}: {}", path.display(), e);
                }
            });
        }
    }

    fn fail(&mut self, id: FileId, reason: String, elapsed: Option<Duration>) {
        warn!("Conversion of file {} failed: {}", id, reason);
        self.registry.apply_failure(id, &reason);
        self.tally.failed += 1;
        JOBS_FINISHED.with_label_values(&["failed"]).inc();
        if let Some(elapsed) = elapsed {
            JOB_DURATION
                .with_label_values(&["failed"])
                .observe(elapsed.as_secs_f64());
        }
        self.events.publish(Event::JobFailed { id, reason });
    }

    fn record_cancelled(&mut self, id: FileId) {
        self.tally.cancelled += 1;
        JOBS_FINISHED.with_label_values(&["cancelled"]).inc();
        self.events.publish(Event::JobCancelled { id });
    }

    /// Cancel a queued or processing job. The entry becomes `cancelled`
    /// immediately; a late engine result for its handle is stale.
    fn cancel_one(&mut self, id: FileId) -> bool {
        match self.active.remove(&id) {
            None => return false,
            Some(ActiveJob::Queued) => {
                self.pending.retain(|queued| *queued != id);
                debug!("Cancelled queued file {}", id);
            }
            Some(ActiveJob::Processing { handle, abort }) => {
                self.in_flight.remove(&handle);
                // The job task may already be reporting its result.
                let _ = abort.send(());
                debug!("Cancelled file {} (job {})", id, handle);
            }
        }

        self.registry
            .apply_status(id, ConversionStatus::Cancelled, None);
        self.record_cancelled(id);
        true
    }

    fn cancel_all(&mut self) -> usize {
        let queued: Vec<FileId> = self.pending.iter().copied().collect();
        let mut processing: Vec<FileId> = self
            .active
            .iter()
            .filter(|(_, job)| matches!(job, ActiveJob::Processing { .. }))
            .map(|(id, _)| *id)
            .collect();
        processing.sort();

        let count = queued
            .into_iter()
            .chain(processing)
            .filter(|id| self.cancel_one(*id))
            .count();

        if count > 0 {
            info!("Cancelled {} jobs", count);
            self.events.publish(Event::AllJobsCancelled { count });
        }
        count
    }

    fn check_batch_finished(&mut self) {
        if !self.active.is_empty() || self.tally.total() == 0 {
            return;
        }

        let summary = std::mem::take(&mut self.tally);
        info!(
            "All jobs finished: {} succeeded, {} failed, {} cancelled",
            summary.succeeded, summary.failed, summary.cancelled
        );
        self.events.publish(Event::BatchFinished {
            succeeded: summary.succeeded,
            failed: summary.failed,
            cancelled: summary.cancelled,
        });
    }

    fn snapshot(&self) -> OrchestratorStatus {
        let mut processing: Vec<FileId> = self.in_flight.values().map(|f| f.file_id).collect();
        processing.sort();

        let mut active_ids = processing;
        active_ids.extend(self.pending.iter().copied());

        OrchestratorStatus {
            running: true,
            queued: self.pending.len(),
            processing: self.in_flight.len(),
            limit: self.settings.current().max_concurrency,
            active_ids,
        }
    }

    fn update_gauges(&self) {
        JOBS_QUEUED.set(self.pending.len() as i64);
        JOBS_PROCESSING.set(self.in_flight.len() as i64);
    }
}

/// Runs one dispatch in its own task.
///
/// Dropping the engine future on abort kills the external process; the
/// result is reported only after that drop.
async fn run_job(
    engine: Arc<dyn ConversionEngine>,
    job: ConversionJob,
    mut abort: oneshot::Receiver<()>,
    commands: mpsc::Sender<Command>,
    progress_buffer: usize,
) {
    let handle = job.job_id;
    let (progress_tx, mut progress_rx) = mpsc::channel(progress_buffer);

    let result = {
        let mut convert = engine.convert(job, progress_tx);
        let mut last_percent = None;

        loop {
            tokio::select! {
                result = &mut convert => break result,
                _ = &mut abort => break Err(EngineError::Cancelled),
                Some(progress) = progress_rx.recv() => {
                    let percent = progress.percent_u8();
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        // Progress is best effort; a full channel drops it.
                        let _ = commands.try_send(Command::Progress { handle, percent });
                    }
                }
            }
        }
    };

    if commands
        .send(Command::Finished { handle, result })
        .await
        .is_err()
    {
        debug!("Scheduler gone before job {} reported", handle);
    }
}
