//! Shared test harness for integration tests.
//!
//! Provides scriptable stand-ins for every collaborator of the pipeline
//! ([`StubFields`], [`StubTranslator`], [`StubSource`], [`MemoryStore`]) and a
//! [`RecordingObserver`] that keeps every callback as an [`EnrichmentEvent`].

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use canopy::enrichment::{
    CatalogStore, CategoryState, DiscoverySettings, EnrichedFields, EnrichmentEvent,
    EnrichmentRequest, FieldEvent, FieldFiller, FieldSchema, FieldProvider, ImageDiscovery,
    ImageSearch, ImageSourceProvider, ImageSourceResult, ImageUploadProgress, ItemPipeline,
    PlantCompleteEvent, PlantProgressEvent, ProgressObserver, QueueOrchestrator, RunState,
    StageEvent, TranslationProvider,
};
use canopy_common::{Category, FieldKey, ImageRef, PipelineStage, RequestId, SourceId};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Field provider
// ---------------------------------------------------------------------------

/// Generates `"<field> of <plant>"` for every field.
#[derive(Default)]
pub struct StubFields {
    /// Plants for which every field fails.
    pub fail_for: HashSet<String>,
    /// Plants for which generation panics.
    pub panic_for: HashSet<String>,
    /// Cancel this token when the n-th call (1-based) starts.
    pub cancel_on_call: Option<(usize, CancellationToken)>,
    pub delay: Option<Duration>,
    pub calls: Mutex<usize>,
}

impl StubFields {
    pub fn failing_for(names: &[&str]) -> Self {
        Self {
            fail_for: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn panicking_for(names: &[&str]) -> Self {
        Self {
            panic_for: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn cancelling_on(call: usize, token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some((call, token)),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl FieldProvider for StubFields {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(
        &self,
        plant_name: &str,
        field: FieldKey,
        _context: &BTreeMap<FieldKey, Value>,
    ) -> anyhow::Result<Value> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if let Some((n, token)) = &self.cancel_on_call {
            if call == *n {
                token.cancel();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_for.contains(plant_name) {
            panic!("provider bug for {plant_name}");
        }
        if self.fail_for.contains(plant_name) {
            anyhow::bail!("model refused {plant_name}");
        }
        Ok(json!(format!("{field} of {plant_name}")))
    }
}

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

pub enum StubTranslator {
    Upper,
    Failing,
}

#[async_trait]
impl TranslationProvider for StubTranslator {
    async fn translate(&self, text: &str) -> anyhow::Result<String> {
        match self {
            Self::Upper => Ok(text.to_uppercase()),
            Self::Failing => anyhow::bail!("translation service unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Image sources
// ---------------------------------------------------------------------------

pub enum SourceBehavior {
    /// Return `n` images with URLs unique to the source and term.
    Images(usize),
    /// Return these exact URLs.
    Urls(Vec<String>),
    Fail(String),
    Panic,
    Decline(String),
    Hang,
    Unavailable,
}

pub struct StubSource {
    id: SourceId,
    behavior: SourceBehavior,
    pub searches: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new(id: &str, behavior: SourceBehavior) -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::new(id),
            behavior,
            searches: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ImageSourceProvider for StubSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn label(&self) -> &str {
        self.id.as_str()
    }

    fn is_available(&self) -> bool {
        !matches!(self.behavior, SourceBehavior::Unavailable)
    }

    async fn search(&self, term: &str, limit: usize) -> anyhow::Result<ImageSearch> {
        self.searches.lock().push(term.to_string());
        let slug = term.to_lowercase().replace(' ', "-");
        match &self.behavior {
            SourceBehavior::Images(n) => Ok(ImageSearch::Found(
                (0..(*n).min(limit))
                    .map(|i| {
                        ImageRef::new(
                            format!("https://{}.test/{slug}/{i}.jpg", self.id),
                            self.id.clone(),
                        )
                    })
                    .collect(),
            )),
            SourceBehavior::Urls(urls) => Ok(ImageSearch::Found(
                urls.iter()
                    .map(|u| ImageRef::new(u.clone(), self.id.clone()))
                    .collect(),
            )),
            SourceBehavior::Fail(message) => anyhow::bail!("{message}"),
            SourceBehavior::Panic => panic!("connector bug"),
            SourceBehavior::Decline(reason) => Ok(ImageSearch::Declined(reason.clone())),
            SourceBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            SourceBehavior::Unavailable => unreachable!("unavailable sources are never queried"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory [`CatalogStore`].
#[derive(Default)]
pub struct MemoryStore {
    /// Plants whose save fails.
    pub fail_save_for: HashSet<String>,
    /// Image URLs whose upload fails.
    pub fail_urls: HashSet<String>,
    /// Cancelled right after a successful save.
    pub cancel_on_save: Option<CancellationToken>,
    pub saved: Mutex<HashMap<RequestId, EnrichedFields>>,
    pub images: Mutex<Vec<(RequestId, ImageRef)>>,
}

impl MemoryStore {
    pub fn saved_for(&self, id: &str) -> Option<EnrichedFields> {
        self.saved.lock().get(&RequestId::new(id)).cloned()
    }

    pub fn images_for(&self, id: &str) -> Vec<ImageRef> {
        let id = RequestId::new(id);
        self.images
            .lock()
            .iter()
            .filter(|(r, _)| *r == id)
            .map(|(_, i)| i.clone())
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn save_fields(
        &self,
        request: &EnrichmentRequest,
        enriched: &EnrichedFields,
    ) -> anyhow::Result<()> {
        if self.fail_save_for.contains(&request.name) {
            anyhow::bail!("disk full");
        }
        self.saved.lock().insert(request.id.clone(), enriched.clone());
        if let Some(token) = &self.cancel_on_save {
            token.cancel();
        }
        Ok(())
    }

    async fn persist_image(&self, request: &EnrichmentRequest, image: &ImageRef) -> anyhow::Result<()> {
        if self.fail_urls.contains(&image.url) {
            anyhow::bail!("upload rejected");
        }
        self.images.lock().push((request.id.clone(), image.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Records every callback in order. Optionally cancels a token once a given
/// number of items have completed.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<EnrichmentEvent>>,
    cancel_after_items: Option<(usize, CancellationToken)>,
    completed: Mutex<usize>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(items: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after_items: Some((items, token)),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<EnrichmentEvent> {
        self.events.lock().clone()
    }

    pub fn stages(&self, plant: &str) -> Vec<PipelineStage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::Progress(s) if s.plant_name == plant => Some(s.stage),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<PlantCompleteEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::PlantComplete(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn source_results(&self) -> Vec<ImageSourceResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::ImageSourceDone(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn upload_progress(&self) -> Vec<ImageUploadProgress> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::ImageUploadProgress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn category_updates(&self) -> Vec<(Category, CategoryState)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::CategoryProgress { category, state } => Some((category, state)),
                _ => None,
            })
            .collect()
    }

    pub fn field_completions(&self) -> Vec<FieldEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::FieldComplete(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn run_states(&self) -> Vec<RunState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                EnrichmentEvent::RunState(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: EnrichmentEvent) {
        self.events.lock().push(event);
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, event: &StageEvent) {
        self.push(EnrichmentEvent::Progress(event.clone()));
    }

    fn on_field_start(&self, event: &FieldEvent) {
        self.push(EnrichmentEvent::FieldStart(*event));
    }

    fn on_field_complete(&self, event: &FieldEvent) {
        self.push(EnrichmentEvent::FieldComplete(*event));
    }

    fn on_category_progress(&self, category: Category, state: &CategoryState) {
        self.push(EnrichmentEvent::CategoryProgress {
            category,
            state: *state,
        });
    }

    fn on_image_source_start(&self, source: &SourceId) {
        self.push(EnrichmentEvent::ImageSourceStart {
            source: source.clone(),
        });
    }

    fn on_image_source_done(&self, result: &ImageSourceResult) {
        self.push(EnrichmentEvent::ImageSourceDone(result.clone()));
    }

    fn on_image_upload_progress(&self, progress: &ImageUploadProgress) {
        self.push(EnrichmentEvent::ImageUploadProgress(*progress));
    }

    fn on_plant_progress(&self, event: &PlantProgressEvent) {
        self.push(EnrichmentEvent::PlantProgress(event.clone()));
    }

    fn on_plant_complete(&self, event: &PlantCompleteEvent) {
        self.push(EnrichmentEvent::PlantComplete(event.clone()));
        let mut completed = self.completed.lock();
        *completed += 1;
        if let Some((n, token)) = &self.cancel_after_items {
            if *completed == *n {
                token.cancel();
            }
        }
    }

    fn on_error(&self, message: &str) {
        self.push(EnrichmentEvent::Error {
            message: message.to_string(),
        });
    }

    fn on_run_state(&self, state: &RunState) {
        self.push(EnrichmentEvent::RunState(state.clone()));
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Collaborators for one orchestrator under test.
pub struct Fixture {
    pub fields: Arc<StubFields>,
    pub store: Arc<MemoryStore>,
    pub sources: Vec<Arc<StubSource>>,
    pub schema: FieldSchema,
    pub settings: DiscoverySettings,
    pub translator: Option<Arc<StubTranslator>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            fields: Arc::new(StubFields::default()),
            store: Arc::new(MemoryStore::default()),
            sources: Vec::new(),
            schema: FieldSchema::full(),
            settings: DiscoverySettings {
                source_timeout: Duration::from_millis(500),
                ..DiscoverySettings::default()
            },
            translator: None,
        }
    }

    pub fn fields(mut self, fields: StubFields) -> Self {
        self.fields = Arc::new(fields);
        self
    }

    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn source(mut self, id: &str, behavior: SourceBehavior) -> Self {
        self.sources.push(StubSource::new(id, behavior));
        self
    }

    pub fn schema(mut self, fields: &[FieldKey]) -> Self {
        self.schema = FieldSchema::new(fields.to_vec()).unwrap();
        self
    }

    pub fn translator(mut self, translator: StubTranslator) -> Self {
        self.translator = Some(Arc::new(translator));
        self
    }

    pub fn pipeline(&self) -> ItemPipeline {
        let sources = self
            .sources
            .iter()
            .map(|s| s.clone() as Arc<dyn ImageSourceProvider>)
            .collect();
        let discovery = ImageDiscovery::new(sources, self.settings).unwrap();
        let filler = FieldFiller::new(self.fields.clone(), self.schema.clone());
        let mut pipeline = ItemPipeline::new(filler, self.store.clone(), discovery);
        if let Some(translator) = &self.translator {
            pipeline = pipeline.with_translator(translator.clone());
        }
        pipeline
    }

    pub fn orchestrator(&self) -> QueueOrchestrator {
        QueueOrchestrator::new(self.pipeline())
    }
}

pub fn request(id: &str, name: &str) -> EnrichmentRequest {
    EnrichmentRequest::new(id, name)
}
