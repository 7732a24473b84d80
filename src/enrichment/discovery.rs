//! Concurrent image discovery across every configured source.
//!
//! Each source runs behind its own guard (availability check, timeout and
//! panic capture), so one misbehaving provider only ever affects its own
//! [`ImageSourceResult`]. All connectors are polled together on the calling
//! task and joined before returning.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use canopy_common::{Error, ImageRef, Result, SourceId, SourceStatus};
use futures::FutureExt;
use tracing::{debug, warn};

use super::context::StageContext;
use super::provider::{ImageSearch, ImageSourceProvider};
use super::types::ImageSourceResult;

/// Limits applied to discovery and image selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Latency budget of one source for one entry.
    pub source_timeout: Duration,
    /// Images requested from, and kept per, source.
    pub max_per_source: usize,
    /// Images kept per entry across all sources.
    pub max_per_item: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(15),
            max_per_source: 3,
            max_per_item: 6,
        }
    }
}

/// Fan-out over all image sources.
pub struct ImageDiscovery {
    sources: Vec<Arc<dyn ImageSourceProvider>>,
    settings: DiscoverySettings,
}

impl ImageDiscovery {
    /// Rejects two sources sharing an ID.
    pub fn new(
        sources: Vec<Arc<dyn ImageSourceProvider>>,
        settings: DiscoverySettings,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.id().clone()) {
                return Err(Error::config(format!(
                    "image source '{}' is configured twice",
                    source.id()
                )));
            }
        }
        Ok(Self { sources, settings })
    }

    pub fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &SourceId> {
        self.sources.iter().map(|s| s.id())
    }

    /// Query every source for `term`.
    ///
    /// The returned map holds exactly one entry per configured source, in a
    /// terminal status (`done`, `skipped` or `error`).
    pub async fn discover(
        &self,
        term: &str,
        ctx: &StageContext<'_>,
    ) -> BTreeMap<SourceId, ImageSourceResult> {
        let mut results: BTreeMap<SourceId, ImageSourceResult> = self
            .sources
            .iter()
            .map(|s| (s.id().clone(), ImageSourceResult::idle(s.id().clone(), s.label())))
            .collect();

        let connectors = self.sources.iter().map(|source| async move {
            ctx.observer.on_image_source_start(source.id());
            let result = self.query_source(source.as_ref(), term).await;
            ctx.observer.on_image_source_done(&result);
            result
        });

        for result in futures::future::join_all(connectors).await {
            results.insert(result.source.clone(), result);
        }

        results
    }

    async fn query_source(&self, source: &dyn ImageSourceProvider, term: &str) -> ImageSourceResult {
        let mut result = ImageSourceResult::idle(source.id().clone(), source.label());

        if !source.is_available() {
            debug!(source = %source.id(), "Image source unavailable, skipping");
            result.status = SourceStatus::Skipped;
            result.error = Some("source is not configured".to_string());
            return result;
        }

        result.status = SourceStatus::Loading;
        let search = AssertUnwindSafe(source.search(term, self.settings.max_per_source))
            .catch_unwind();

        match tokio::time::timeout(self.settings.source_timeout, search).await {
            Ok(Ok(Ok(ImageSearch::Found(images)))) => {
                result.status = SourceStatus::Done;
                result.images = images;
            }
            Ok(Ok(Ok(ImageSearch::Declined(reason)))) => {
                result.status = SourceStatus::Skipped;
                result.error = Some(reason);
            }
            Ok(Ok(Err(e))) => {
                warn!(source = %source.id(), error = %format!("{e:#}"), "Image source failed");
                result.status = SourceStatus::Error;
                result.error = Some(format!("{e:#}"));
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(source = %source.id(), panic = %message, "Image source panicked");
                result.status = SourceStatus::Error;
                result.error = Some(format!("source panicked: {message}"));
            }
            Err(_) => {
                warn!(source = %source.id(), timeout = ?self.settings.source_timeout, "Image source timed out");
                result.status = SourceStatus::Error;
                result.error = Some(format!(
                    "timed out after {}ms",
                    self.settings.source_timeout.as_millis()
                ));
            }
        }

        result
    }

    /// Pick the images to upload.
    ///
    /// Up to `max_per_source` images from each `done` source, in configured
    /// source order, skipping URLs already picked, capped at `max_per_item`.
    pub fn select_images(&self, results: &BTreeMap<SourceId, ImageSourceResult>) -> Vec<ImageRef> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for source in &self.sources {
            let Some(result) = results.get(source.id()) else {
                continue;
            };
            if result.status != SourceStatus::Done {
                continue;
            }

            let mut taken = 0;
            for image in &result.images {
                if selected.len() >= self.settings.max_per_item {
                    return selected;
                }
                if taken >= self.settings.max_per_source {
                    break;
                }
                if seen.insert(image.url.as_str()) {
                    selected.push(image.clone());
                    taken += 1;
                }
            }
        }

        selected
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
