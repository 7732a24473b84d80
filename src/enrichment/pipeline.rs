//! Per-item enrichment state machine.
//!
//! ```text
//! idle -> filling -> translating_name -> saving -> fetching_images -> uploading_images -> done
//!            \______________\_______________\___________\__________________\______-> error
//! ```
//!
//! Every stage failure is caught here and turned into one
//! [`EnrichmentOutcome`]; nothing escapes to the orchestrator.

use std::sync::Arc;
use std::time::Instant;

use canopy_common::{Error, PipelineStage, Result};
use chrono::Utc;
use tracing::{info, instrument, warn};

use super::context::StageContext;
use super::discovery::ImageDiscovery;
use super::fill::FieldFiller;
use super::observer::StageEvent;
use super::progress::ImageUploadProgress;
use super::provider::{CatalogStore, TranslationProvider};
use super::types::{EnrichedFields, EnrichmentOutcome, EnrichmentRequest};
use super::upload::ImageUploader;

/// Tracks the current stage and only lets it move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTracker {
    current: PipelineStage,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Move to `next`. Terminal stages are final and stages never repeat or
    /// go back.
    pub fn advance(&mut self, next: PipelineStage) -> Result<()> {
        if self.current.is_terminal() || next <= self.current {
            return Err(Error::internal(format!(
                "invalid stage transition {} -> {}",
                self.current, next
            )));
        }
        self.current = next;
        Ok(())
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state of one item while it moves through the stages.
struct ItemRun<'a, 'c> {
    request: &'a EnrichmentRequest,
    ctx: &'a StageContext<'c>,
    stages: StageTracker,
    saved: bool,
    upload: ImageUploadProgress,
}

impl ItemRun<'_, '_> {
    fn enter(&mut self, stage: PipelineStage) -> Result<()> {
        self.stages.advance(stage)?;
        self.ctx.observer.on_progress(&StageEvent {
            stage,
            plant_name: self.request.name.clone(),
        });
        Ok(())
    }

    /// Check cancellation, then enter `stage`.
    fn enter_unless_cancelled(&mut self, stage: PipelineStage) -> Result<()> {
        self.ctx.check_cancelled()?;
        self.enter(stage)
    }
}

/// Runs one catalog entry through every stage.
pub struct ItemPipeline {
    filler: FieldFiller,
    translator: Option<Arc<dyn TranslationProvider>>,
    store: Arc<dyn CatalogStore>,
    discovery: ImageDiscovery,
    uploader: ImageUploader,
}

impl ItemPipeline {
    pub fn new(filler: FieldFiller, store: Arc<dyn CatalogStore>, discovery: ImageDiscovery) -> Self {
        Self {
            filler,
            translator: None,
            uploader: ImageUploader::new(Arc::clone(&store)),
            store,
            discovery,
        }
    }

    /// Builder: translate entry names before saving.
    pub fn with_translator(mut self, translator: Arc<dyn TranslationProvider>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn filler(&self) -> &FieldFiller {
        &self.filler
    }

    pub fn discovery(&self) -> &ImageDiscovery {
        &self.discovery
    }

    /// Enrich one entry and report how it went.
    ///
    /// Cancellation seen before the save commits ends the item as cancelled
    /// (not successful). Seen after the save, the image stages are skipped and
    /// the item stays successful.
    #[instrument(skip_all, fields(id = %request.id, plant = %request.name))]
    pub async fn run(&self, request: &EnrichmentRequest, ctx: &StageContext<'_>) -> EnrichmentOutcome {
        let started = Instant::now();
        let mut item = ItemRun {
            request,
            ctx,
            stages: StageTracker::new(),
            saved: false,
            upload: ImageUploadProgress::default(),
        };

        let result = self.run_stages(&mut item).await;

        let (success, cancelled, error) = match result {
            Ok(()) => (true, false, None),
            Err(e) if item.saved => {
                warn!(error = %e, "Post-save stage failed; entry kept as enriched");
                (true, false, None)
            }
            Err(Error::Cancelled) => {
                info!(stage = %item.stages.current(), "Enrichment cancelled before save");
                (false, true, Some(Error::Cancelled.to_string()))
            }
            Err(e) => (false, false, Some(e.to_string())),
        };

        let terminal = if success {
            PipelineStage::Done
        } else {
            PipelineStage::Error
        };
        if item.stages.current() != terminal {
            if let Err(e) = item.enter(terminal) {
                warn!(error = %e, "Could not enter terminal stage");
            }
        }

        EnrichmentOutcome {
            request_id: request.id.clone(),
            name: request.name.clone(),
            success,
            cancelled,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
            images_uploaded: item.upload.uploaded,
            images_failed: item.upload.failed,
            finished_at: Utc::now(),
        }
    }

    async fn run_stages(&self, item: &mut ItemRun<'_, '_>) -> Result<()> {
        let (request, ctx) = (item.request, item.ctx);
        let name = request.name.as_str();

        item.enter_unless_cancelled(PipelineStage::Filling)?;
        let fields = self.filler.fill(name, ctx).await?;

        item.enter_unless_cancelled(PipelineStage::TranslatingName)?;
        let translated_name = self.translate(name).await;

        item.enter_unless_cancelled(PipelineStage::Saving)?;
        let enriched = EnrichedFields {
            translated_name,
            fields,
        };
        self.store
            .save_fields(request, &enriched)
            .await
            .map_err(|e| Error::stage(PipelineStage::Saving, format!("{e:#}")))?;
        item.saved = true;

        if ctx.is_cancelled() {
            info!("Cancelled after save; skipping images");
            item.enter(PipelineStage::Done)?;
            return Ok(());
        }
        item.enter(PipelineStage::FetchingImages)?;
        let results = self.discovery.discover(name, ctx).await;
        let images = self.discovery.select_images(&results);

        if ctx.is_cancelled() {
            info!("Cancelled after discovery; skipping uploads");
            item.enter(PipelineStage::Done)?;
            return Ok(());
        }
        item.enter(PipelineStage::UploadingImages)?;
        item.upload = self.uploader.upload(request, &images, ctx).await;

        item.enter(PipelineStage::Done)?;
        Ok(())
    }

    /// Best-effort name translation; failures only log.
    async fn translate(&self, name: &str) -> Option<String> {
        let translator = self.translator.as_ref()?;
        match translator.translate(name).await {
            Ok(translated) => Some(translated),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Name translation failed; continuing without it");
                None
            }
        }
    }
}
