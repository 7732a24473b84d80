//! Progress observer interface and the bundled observers.
//!
//! The orchestrator reports every step of a run through a single
//! [`ProgressObserver`]. Callbacks are synchronous and run on the run's task,
//! so for one item they arrive in stage order and never interleave with
//! another item's callbacks.

use canopy_common::{Category, FieldKey, PipelineStage, RequestId, SourceId, SourceStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::progress::{CategoryState, ImageUploadProgress, RunState};
use super::types::ImageSourceResult;

/// The pipeline entered `stage` for `plant_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: PipelineStage,
    pub plant_name: String,
}

/// A field started or finished generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEvent {
    pub field: FieldKey,
    pub fields_completed: usize,
    pub total_fields: usize,
}

/// The orchestrator moved to a new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantProgressEvent {
    /// 1-based position of the item being processed.
    pub current: usize,
    pub total: usize,
    pub plant_name: String,
}

/// An item finished, successfully or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantCompleteEvent {
    pub plant_name: String,
    pub request_id: RequestId,
    pub success: bool,
    pub cancelled: bool,
    pub error: Option<String>,
}

/// Receives progress of an enrichment run.
///
/// Every method defaults to doing nothing, so implementors only override what
/// they care about.
///
/// Callbacks run inline on the run's task and should return quickly. A
/// callback that panics while an item is being processed fails that item
/// (the panic is contained at the item boundary like any other stage panic)
/// and the run moves on. Panics from the per-run callbacks outside an item
/// (`on_run_state`, `on_plant_progress`, `on_plant_complete`, `on_error`)
/// are not caught and end the run.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, _event: &StageEvent) {}

    fn on_field_start(&self, _event: &FieldEvent) {}

    fn on_field_complete(&self, _event: &FieldEvent) {}

    fn on_category_progress(&self, _category: Category, _state: &CategoryState) {}

    fn on_image_source_start(&self, _source: &SourceId) {}

    fn on_image_source_done(&self, _result: &ImageSourceResult) {}

    fn on_image_upload_progress(&self, _progress: &ImageUploadProgress) {}

    fn on_plant_progress(&self, _event: &PlantProgressEvent) {}

    fn on_plant_complete(&self, _event: &PlantCompleteEvent) {}

    /// A failure worth surfacing to an operator. Never called for
    /// cancellation.
    fn on_error(&self, _message: &str) {}

    fn on_run_state(&self, _state: &RunState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that turns progress into structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, event: &StageEvent) {
        debug!(plant = %event.plant_name, stage = %event.stage, "Stage entered");
    }

    fn on_field_complete(&self, event: &FieldEvent) {
        debug!(
            field = %event.field,
            completed = event.fields_completed,
            total = event.total_fields,
            "Field generated"
        );
    }

    fn on_image_source_done(&self, result: &ImageSourceResult) {
        match (result.status, &result.error) {
            (SourceStatus::Error, Some(e)) => {
                warn!(source = %result.source, error = %e, "Image source failed")
            }
            (SourceStatus::Skipped, reason) => debug!(
                source = %result.source,
                reason = reason.as_deref().unwrap_or(""),
                "Image source skipped"
            ),
            _ => debug!(
                source = %result.source,
                status = %result.status,
                images = result.images.len(),
                "Image source finished"
            ),
        }
    }

    fn on_image_upload_progress(&self, progress: &ImageUploadProgress) {
        debug!(
            current = progress.current,
            total = progress.total,
            uploaded = progress.uploaded,
            failed = progress.failed,
            "Image upload progress"
        );
    }

    fn on_plant_progress(&self, event: &PlantProgressEvent) {
        info!(
            plant = %event.plant_name,
            "Enriching {}/{}",
            event.current,
            event.total
        );
    }

    fn on_plant_complete(&self, event: &PlantCompleteEvent) {
        if event.success {
            info!(plant = %event.plant_name, id = %event.request_id, "Plant enriched");
        } else if event.cancelled {
            info!(plant = %event.plant_name, id = %event.request_id, "Plant enrichment cancelled");
        } else {
            warn!(
                plant = %event.plant_name,
                id = %event.request_id,
                error = event.error.as_deref().unwrap_or("unknown error"),
                "Plant enrichment failed"
            );
        }
    }

    fn on_error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Serializable form of every observer callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EnrichmentEvent {
    Progress(StageEvent),
    FieldStart(FieldEvent),
    FieldComplete(FieldEvent),
    CategoryProgress {
        category: Category,
        #[serde(flatten)]
        state: CategoryState,
    },
    ImageSourceStart {
        source: SourceId,
    },
    ImageSourceDone(ImageSourceResult),
    ImageUploadProgress(ImageUploadProgress),
    PlantProgress(PlantProgressEvent),
    PlantComplete(PlantCompleteEvent),
    Error {
        message: String,
    },
    RunState(RunState),
}

/// Observer that republishes every callback on a broadcast channel.
///
/// Sending never blocks; events are dropped when nobody is subscribed, and
/// slow subscribers observe a lag error from the channel.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<EnrichmentEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnrichmentEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream, skipping events lost to lag.
    pub fn stream(&self) -> impl futures::Stream<Item = EnrichmentEvent> {
        use futures::StreamExt;
        tokio_stream::wrappers::BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
    }

    fn send(&self, event: EnrichmentEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for enrichment event");
        }
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressObserver for BroadcastObserver {
    fn on_progress(&self, event: &StageEvent) {
        self.send(EnrichmentEvent::Progress(event.clone()));
    }

    fn on_field_start(&self, event: &FieldEvent) {
        self.send(EnrichmentEvent::FieldStart(*event));
    }

    fn on_field_complete(&self, event: &FieldEvent) {
        self.send(EnrichmentEvent::FieldComplete(*event));
    }

    fn on_category_progress(&self, category: Category, state: &CategoryState) {
        self.send(EnrichmentEvent::CategoryProgress {
            category,
            state: *state,
        });
    }

    fn on_image_source_start(&self, source: &SourceId) {
        self.send(EnrichmentEvent::ImageSourceStart {
            source: source.clone(),
        });
    }

    fn on_image_source_done(&self, result: &ImageSourceResult) {
        self.send(EnrichmentEvent::ImageSourceDone(result.clone()));
    }

    fn on_image_upload_progress(&self, progress: &ImageUploadProgress) {
        self.send(EnrichmentEvent::ImageUploadProgress(*progress));
    }

    fn on_plant_progress(&self, event: &PlantProgressEvent) {
        self.send(EnrichmentEvent::PlantProgress(event.clone()));
    }

    fn on_plant_complete(&self, event: &PlantCompleteEvent) {
        self.send(EnrichmentEvent::PlantComplete(event.clone()));
    }

    fn on_error(&self, message: &str) {
        self.send(EnrichmentEvent::Error {
            message: message.to_string(),
        });
    }

    fn on_run_state(&self, state: &RunState) {
        self.send(EnrichmentEvent::RunState(state.clone()));
    }
}
