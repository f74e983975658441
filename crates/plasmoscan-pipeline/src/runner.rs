//! Sequential batch analysis runner.
//!
//! Images are submitted to the analysis service **strictly in selection
//! order, one at a time**: submit image i, await its outcome, append it,
//! advance the cursor, emit progress, then move to image i+1. The strict
//! sequencing is deliberate — it bounds peak memory and network load on
//! constrained field devices and gives the operator a meaningful
//! incremental progress indicator. Do not parallelize this loop.
//!
//! A per-image failure or timeout occupies that image's result slot and the
//! run continues; the batch still reaches Completed carrying a mix of
//! successes and failures the caller can retry individually.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use plasmoscan_core::{
    defaults, AnalysisBackend, AnalysisOutcome, AppEvent, BatchJob, BatchSummary, Error,
    EventBus, JobState, Result,
};

/// Configuration for the batch runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Per-image analysis deadline. Exceeding it records a per-image
    /// failure, never a batch abort.
    pub analysis_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(defaults::ANALYSIS_TIMEOUT_SECS),
        }
    }
}

impl RunnerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PLASMOSCAN_JOB_TIMEOUT_SECS` | `60` | Per-image analysis deadline |
    pub fn from_env() -> Self {
        let analysis_timeout_secs = std::env::var("PLASMOSCAN_JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::ANALYSIS_TIMEOUT_SECS);

        Self {
            analysis_timeout: Duration::from_secs(analysis_timeout_secs),
        }
    }

    /// Set the per-image analysis deadline.
    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }
}

/// Event emitted by a running batch.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// The batch started running.
    Started { job_id: Uuid, total: usize },
    /// One image's outcome was appended. `index` is the 1-based count of
    /// completed images.
    Progress {
        job_id: Uuid,
        index: usize,
        total: usize,
        last: AnalysisOutcome,
    },
    /// All slots are filled; the job is Completed.
    Completed { job_id: Uuid, total: usize },
    /// The job was cancelled; partial results were discarded.
    Cancelled { job_id: Uuid, completed: usize },
}

/// Handle for observing and cancelling a running batch.
#[derive(Debug)]
pub struct BatchHandle {
    job_id: Uuid,
    cancel_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<BatchEvent>,
    join: JoinHandle<BatchJob>,
}

impl BatchHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Request cooperative cancellation. Takes effect no later than the
    /// completion of the in-flight submission; safe to call repeatedly or
    /// after completion.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.try_send(());
    }

    /// Get a receiver for this batch's events.
    pub fn events(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the terminal job (Completed or Cancelled).
    pub async fn join(self) -> Result<BatchJob> {
        self.join
            .await
            .map_err(|e| Error::Internal(format!("batch task failed: {e}")))
    }
}

/// Drives batch jobs through the analysis service.
pub struct BatchRunner {
    backend: Arc<dyn AnalysisBackend>,
    config: RunnerConfig,
    event_tx: broadcast::Sender<BatchEvent>,
    bus: Option<EventBus>,
}

impl BatchRunner {
    /// Create a runner with default configuration.
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            backend,
            config: RunnerConfig::default(),
            event_tx,
            bus: None,
        }
    }

    /// Set the runner configuration.
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Mirror coarse progress onto the application event bus.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Get a receiver for batch events across all jobs run by this runner.
    pub fn events(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn a run over an Idle job and return a control handle.
    ///
    /// A job runs at most once; re-running a Completed (or Cancelled) job is
    /// rejected — create a new BatchJob instead.
    pub fn start(&self, job: BatchJob) -> Result<BatchHandle> {
        if job.state != JobState::Idle {
            return Err(Error::JobAlreadyRan(job.id));
        }

        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        let job_id = job.id;

        let worker = RunnerTask {
            backend: self.backend.clone(),
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            bus: self.bus.clone(),
        };
        let join = tokio::spawn(async move { worker.run(job, cancel_rx).await });

        Ok(BatchHandle {
            job_id,
            cancel_tx,
            event_rx,
            join,
        })
    }

    /// Run a job to its terminal state inline.
    pub async fn run(&self, job: BatchJob) -> Result<BatchJob> {
        self.start(job)?.join().await
    }
}

/// Reference bundle moved into the spawned run task.
struct RunnerTask {
    backend: Arc<dyn AnalysisBackend>,
    config: RunnerConfig,
    event_tx: broadcast::Sender<BatchEvent>,
    bus: Option<EventBus>,
}

impl RunnerTask {
    async fn run(self, mut job: BatchJob, mut cancel_rx: mpsc::Receiver<()>) -> BatchJob {
        let start = Instant::now();
        let total = job.images.len();
        job.state = JobState::Running;

        info!(
            subsystem = "pipeline",
            component = "batch_runner",
            op = "run",
            job_id = %job.id,
            sample_id = %job.sample_id,
            image_count = total,
            "Batch started"
        );
        let _ = self.event_tx.send(BatchEvent::Started {
            job_id: job.id,
            total,
        });
        self.emit_bus(AppEvent::BatchStarted {
            job_id: job.id,
            total,
        });

        while job.current_index < total {
            // Cancellation is checked between submissions...
            if cancel_rx.try_recv().is_ok() {
                return self.cancelled(job, start);
            }

            let uri = job.images[job.current_index].uri.clone();
            let submission = timeout(
                self.config.analysis_timeout,
                self.backend.analyze(&uri, job.sample_type),
            );

            // ...and raced against the in-flight call. Losing the race
            // abandons the submission; nothing is appended, so `results`
            // stays consistent.
            let outcome = tokio::select! {
                _ = cancel_rx.recv() => {
                    return self.cancelled(job, start);
                }
                resolved = submission => match resolved {
                    Ok(Ok(result)) => AnalysisOutcome::Analyzed(result),
                    Ok(Err(e)) => {
                        warn!(
                            subsystem = "pipeline",
                            component = "batch_runner",
                            op = "run",
                            job_id = %job.id,
                            image_uri = %uri,
                            error = %e,
                            "Image analysis failed, continuing batch"
                        );
                        AnalysisOutcome::Failed {
                            image_uri: uri.clone(),
                            reason: e.to_string(),
                        }
                    }
                    Err(_elapsed) => {
                        warn!(
                            subsystem = "pipeline",
                            component = "batch_runner",
                            op = "run",
                            job_id = %job.id,
                            image_uri = %uri,
                            timeout_secs = self.config.analysis_timeout.as_secs(),
                            "Image analysis timed out, continuing batch"
                        );
                        AnalysisOutcome::Failed {
                            image_uri: uri.clone(),
                            reason: format!(
                                "analysis timed out after {}s",
                                self.config.analysis_timeout.as_secs()
                            ),
                        }
                    }
                },
            };

            job.results.push(outcome.clone());
            job.current_index += 1;

            debug!(
                subsystem = "pipeline",
                component = "batch_runner",
                op = "run",
                job_id = %job.id,
                image_uri = %uri,
                index = job.current_index,
                total,
                "Image slot filled"
            );
            let _ = self.event_tx.send(BatchEvent::Progress {
                job_id: job.id,
                index: job.current_index,
                total,
                last: outcome,
            });
            self.emit_bus(AppEvent::BatchProgress {
                job_id: job.id,
                index: job.current_index,
                total,
            });
        }

        job.state = JobState::Completed;
        let positive = job
            .results
            .iter()
            .filter(|o| o.as_analyzed().is_some_and(|r| r.parasites_detected))
            .count();

        info!(
            subsystem = "pipeline",
            component = "batch_runner",
            op = "run",
            job_id = %job.id,
            image_count = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch completed"
        );
        let _ = self.event_tx.send(BatchEvent::Completed {
            job_id: job.id,
            total,
        });
        self.emit_bus(AppEvent::BatchCompleted {
            job_id: job.id,
            total,
            positive,
        });

        job
    }

    /// Mark the job Cancelled and discard partial results. `current_index`
    /// keeps the count of images that had completed before cancellation.
    fn cancelled(&self, mut job: BatchJob, start: Instant) -> BatchJob {
        job.state = JobState::Cancelled;
        job.results.clear();
        let completed = job.current_index;

        info!(
            subsystem = "pipeline",
            component = "batch_runner",
            op = "run",
            job_id = %job.id,
            completed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch cancelled, partial results discarded"
        );
        let _ = self.event_tx.send(BatchEvent::Cancelled {
            job_id: job.id,
            completed,
        });
        self.emit_bus(AppEvent::BatchCancelled {
            job_id: job.id,
            completed,
        });
        job
    }

    fn emit_bus(&self, event: AppEvent) {
        if let Some(bus) = &self.bus {
            bus.emit(event);
        }
    }
}

/// Aggregate a Completed job. Fails with `JobNotCompleted` for Running,
/// Idle, or Cancelled jobs — a cancelled batch never yields a summary.
pub fn summarize(job: &BatchJob) -> Result<BatchSummary> {
    job.summary()
}
