//! Bulk content enrichment.
//!
//! A [`QueueOrchestrator`] takes a queue of [`EnrichmentRequest`]s and runs
//! each through the [`ItemPipeline`]:
//!
//! 1. **filling**: AI content for every schema field ([`FieldFiller`])
//! 2. **translating_name**: best-effort name translation
//! 3. **saving**: one atomic write of all fields ([`CatalogStore`])
//! 4. **fetching_images**: concurrent search across all sources ([`ImageDiscovery`])
//! 5. **uploading_images**: persist the selected images ([`ImageUploader`])
//!
//! Progress is reported through a [`ProgressObserver`].

mod context;
pub mod discovery;
pub mod fields;
pub mod fill;
pub mod observer;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod providers;
mod types;
pub mod upload;

pub use context::StageContext;
pub use discovery::{DiscoverySettings, ImageDiscovery};
pub use fields::FieldSchema;
pub use fill::FieldFiller;
pub use observer::{
    BroadcastObserver, EnrichmentEvent, FieldEvent, NoopObserver, PlantCompleteEvent,
    PlantProgressEvent, ProgressObserver, StageEvent, TracingObserver,
};
pub use orchestrator::{CancelHandle, QueueOrchestrator, RunHandle};
pub use pipeline::{ItemPipeline, StageTracker};
pub use progress::{
    CategoryProgress, CategoryState, CategoryStatus, FieldProgress, ImageUploadProgress,
    OverallProgress, RunState,
};
pub use provider::{
    CatalogStore, FieldProvider, ImageSearch, ImageSourceProvider, TranslationProvider,
};
pub use types::{EnrichedFields, EnrichmentOutcome, EnrichmentRequest, ImageSourceResult, RunReport};
pub use upload::ImageUploader;
