//! Queue orchestrator: drives a batch of entries through the item pipeline.
//!
//! Items run strictly one after another in submission order. The orchestrator
//! owns the only cross-item state (the [`RunState`] and the outcome log) and
//! the cancellation token of the active run. Cancellation is soft: the current
//! item finishes its current stage and no further item is started.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Instant;

use canopy_common::{Error, Result, RunId};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::StageContext;
use super::discovery::panic_message;
use super::observer::{PlantCompleteEvent, PlantProgressEvent, ProgressObserver};
use super::pipeline::ItemPipeline;
use super::progress::{OverallProgress, RunState};
use super::types::{EnrichmentOutcome, EnrichmentRequest, RunReport};

struct ActiveRun {
    run_id: RunId,
    token: CancellationToken,
}

struct Inner {
    pipeline: ItemPipeline,
    state: RwLock<RunState>,
    log: RwLock<Vec<EnrichmentOutcome>>,
    active: Mutex<Option<ActiveRun>>,
}

impl Inner {
    /// Request cancellation of `run_id` if it is still the active run.
    fn cancel_run(&self, run_id: RunId) {
        let active = self.active.lock();
        if let Some(run) = active.as_ref().filter(|r| r.run_id == run_id) {
            if !run.token.is_cancelled() {
                info!(run_id = %run_id, "Cancellation requested");
            }
            run.token.cancel();
            self.state.write().cancellation_requested = true;
        }
    }
}

/// Cancels one run. Cloneable, idempotent, and a no-op once the run ended.
#[derive(Clone)]
pub struct CancelHandle {
    run_id: RunId,
    inner: Weak<Inner>,
}

impl CancelHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_run(self.run_id);
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("run_id", &self.run_id)
            .finish()
    }
}

/// A run spawned with [`QueueOrchestrator::start`].
pub struct RunHandle {
    cancel: CancelHandle,
    join: JoinHandle<Result<RunReport>>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.cancel.run_id)
            .field("finished", &self.join.is_finished())
            .finish()
    }
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.cancel.run_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunReport> {
        self.join
            .await
            .map_err(|e| Error::internal(format!("enrichment run task failed: {e}")))?
    }
}

/// Releases the active-run slot and resets the run state, even if the run
/// future is dropped early.
struct RunGuard {
    inner: Arc<Inner>,
    run_id: RunId,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.inner.active.lock();
        if active.as_ref().is_some_and(|r| r.run_id == self.run_id) {
            *active = None;
        }
        *self.inner.state.write() = RunState::default();
    }
}

/// Top-level driver of enrichment runs.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use canopy::enrichment::{EnrichmentRequest, QueueOrchestrator, TracingObserver};
/// # async fn example(orchestrator: QueueOrchestrator) -> canopy_common::Result<()> {
/// let handle = orchestrator.start(
///     vec![EnrichmentRequest::new("ficus", "Ficus lyrata")],
///     Arc::new(TracingObserver),
/// )?;
/// let report = handle.wait().await?;
/// println!("{} succeeded, {} failed", report.succeeded, report.failed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueueOrchestrator {
    inner: Arc<Inner>,
}

impl QueueOrchestrator {
    pub fn new(pipeline: ItemPipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                state: RwLock::new(RunState::default()),
                log: RwLock::new(Vec::new()),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn pipeline(&self) -> &ItemPipeline {
        &self.inner.pipeline
    }

    /// Spawn a run on the tokio runtime.
    ///
    /// Fails with [`Error::AlreadyRunning`] while another run is active.
    pub fn start(
        &self,
        requests: Vec<EnrichmentRequest>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<RunHandle> {
        let token = CancellationToken::new();
        let guard = self.claim(token.clone())?;
        let cancel = self.cancel_handle_for(guard.run_id);

        let this = self.clone();
        let join = tokio::spawn(async move {
            this.execute(guard, requests, observer.as_ref(), token)
                .await
        });

        Ok(RunHandle { cancel, join })
    }

    /// Run to completion on the current task.
    ///
    /// `cancel` is the run's cancellation signal; cancelling it has the same
    /// effect as [`CancelHandle::cancel`].
    pub async fn run(
        &self,
        requests: Vec<EnrichmentRequest>,
        observer: &dyn ProgressObserver,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let guard = self.claim(cancel.clone())?;
        self.execute(guard, requests, observer, cancel).await
    }

    /// Cancel whatever run is active. No-op when idle.
    pub fn cancel(&self) {
        let run_id = self.inner.active.lock().as_ref().map(|r| r.run_id);
        if let Some(run_id) = run_id {
            self.inner.cancel_run(run_id);
        }
    }

    /// Handle for the active run, if any.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        let run_id = self.inner.active.lock().as_ref().map(|r| r.run_id)?;
        Some(self.cancel_handle_for(run_id))
    }

    pub fn is_running(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Snapshot of the current run state.
    pub fn run_state(&self) -> RunState {
        self.inner.state.read().clone()
    }

    /// Snapshot of the outcome log (all runs since the last clear).
    pub fn outcomes(&self) -> Vec<EnrichmentOutcome> {
        self.inner.log.read().clone()
    }

    /// Empty the outcome log. Rejected while a run is active.
    pub fn clear_log(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.inner.log.write().clear();
        Ok(())
    }

    fn cancel_handle_for(&self, run_id: RunId) -> CancelHandle {
        CancelHandle {
            run_id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn claim(&self, token: CancellationToken) -> Result<RunGuard> {
        let mut active = self.inner.active.lock();
        if active.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let run_id = RunId::new();
        *active = Some(ActiveRun { run_id, token });
        Ok(RunGuard {
            inner: Arc::clone(&self.inner),
            run_id,
        })
    }

    fn publish_state(&self, observer: &dyn ProgressObserver, update: impl FnOnce(&mut RunState)) {
        let snapshot = {
            let mut state = self.inner.state.write();
            update(&mut state);
            state.clone()
        };
        observer.on_run_state(&snapshot);
    }

    async fn execute(
        &self,
        guard: RunGuard,
        requests: Vec<EnrichmentRequest>,
        observer: &dyn ProgressObserver,
        token: CancellationToken,
    ) -> Result<RunReport> {
        let run_id = guard.run_id;
        let started = Instant::now();
        let total = requests.len();

        if let Err(e) = validate_queue(&requests) {
            observer.on_error(&e.to_string());
            return Err(e);
        }

        info!(run_id = %run_id, total, "Enrichment run started");
        self.publish_state(observer, |state| {
            *state = RunState {
                running: true,
                overall_progress: OverallProgress { current: 0, total },
                current_item_name: None,
                cancellation_requested: token.is_cancelled(),
            };
        });

        let ctx = StageContext::new(observer, &token);
        let mut outcomes = Vec::with_capacity(total);

        for (index, request) in requests.iter().enumerate() {
            if token.is_cancelled() {
                info!(run_id = %run_id, remaining = total - index, "Run cancelled; remaining items skipped");
                break;
            }

            self.publish_state(observer, |state| {
                state.current_item_name = Some(request.name.clone());
                state.cancellation_requested |= token.is_cancelled();
            });
            observer.on_plant_progress(&PlantProgressEvent {
                current: index + 1,
                total,
                plant_name: request.name.clone(),
            });

            let item_started = Instant::now();
            let outcome = match AssertUnwindSafe(self.inner.pipeline.run(request, &ctx))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(id = %request.id, panic = %message, "Item pipeline panicked");
                    EnrichmentOutcome {
                        request_id: request.id.clone(),
                        name: request.name.clone(),
                        success: false,
                        cancelled: false,
                        error: Some(format!("internal error: {message}")),
                        duration_ms: item_started.elapsed().as_millis() as u64,
                        images_uploaded: 0,
                        images_failed: 0,
                        finished_at: Utc::now(),
                    }
                }
            };

            self.inner.log.write().push(outcome.clone());
            self.publish_state(observer, |state| {
                state.overall_progress.current = index + 1;
                state.cancellation_requested |= token.is_cancelled();
            });

            if !outcome.success && !outcome.cancelled {
                let error = outcome.error.as_deref().unwrap_or("unknown error");
                observer.on_error(&format!("{}: {}", outcome.name, error));
            }
            observer.on_plant_complete(&PlantCompleteEvent {
                plant_name: outcome.name.clone(),
                request_id: outcome.request_id.clone(),
                success: outcome.success,
                cancelled: outcome.cancelled,
                error: outcome.error.clone(),
            });

            outcomes.push(outcome);
        }

        let processed = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let report = RunReport {
            run_id,
            succeeded,
            failed: processed - succeeded,
            cancelled: token.is_cancelled(),
            processed,
            skipped: total - processed,
            duration_ms: started.elapsed().as_millis() as u64,
            outcomes,
        };

        self.publish_state(observer, |state| {
            state.running = false;
            state.current_item_name = None;
            state.cancellation_requested |= token.is_cancelled();
        });
        info!(
            run_id = %run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Enrichment run finished"
        );

        drop(guard);
        Ok(report)
    }
}

/// Reject queues the orchestrator cannot process meaningfully.
fn validate_queue(requests: &[EnrichmentRequest]) -> Result<()> {
    let mut seen = HashSet::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(&request.id) {
            return Err(Error::invalid_input(format!(
                "request id '{}' appears more than once in the queue",
                request.id
            )));
        }
    }
    Ok(())
}
