//! Collaborator interfaces used by the pipeline.
//!
//! Every external system the pipeline talks to sits behind one of these
//! traits: the AI field generator, the name translator, image search
//! providers and the catalog store. Reference HTTP and SQLite
//! implementations live in [`super::providers`] and [`crate::storage`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use canopy_common::{FieldKey, ImageRef, SourceId};

use super::types::{EnrichedFields, EnrichmentRequest};

/// Generates content for one catalog field.
#[async_trait]
pub trait FieldProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Generate the value of `field` for `plant_name`.
    ///
    /// `context` holds the fields already generated for this entry.
    async fn generate(
        &self,
        plant_name: &str,
        field: FieldKey,
        context: &BTreeMap<FieldKey, serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Best-effort translation of entry names.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str) -> anyhow::Result<String>;
}

/// What an image source answered for a search term.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSearch {
    Found(Vec<ImageRef>),
    /// The provider chose not to answer for this term; the reason is shown
    /// to the caller.
    Declined(String),
}

/// One external image search provider.
#[async_trait]
pub trait ImageSourceProvider: Send + Sync {
    fn id(&self) -> &SourceId;

    /// Human-readable name.
    fn label(&self) -> &str;

    /// Whether the provider is configured well enough to be queried.
    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, term: &str, limit: usize) -> anyhow::Result<ImageSearch>;
}

/// Persistence for enriched entries and their images.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Atomically save every generated field of an entry.
    async fn save_fields(
        &self,
        request: &EnrichmentRequest,
        enriched: &EnrichedFields,
    ) -> anyhow::Result<()>;

    /// Persist one discovered image for an entry.
    async fn persist_image(&self, request: &EnrichmentRequest, image: &ImageRef)
        -> anyhow::Result<()>;
}
