//! SQLite + filesystem catalog store.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use canopy_common::{ImageId, ImageRef, RequestId, RunId};
use canopy_db::models::{OutcomeRecord, PlantImage};
use canopy_db::pool::{get_conn, DbPool};
use canopy_db::queries::{images, outcomes, plants};
use chrono::Utc;
use tracing::debug;

use super::files::ImageFiles;
use crate::enrichment::{CatalogStore, EnrichedFields, EnrichmentOutcome, EnrichmentRequest};
use crate::http::{ensure_success, RetryingClient};

/// Largest image accepted for download.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// [`CatalogStore`] writing plants and image records to SQLite and image
/// files to disk.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: DbPool,
    files: Arc<ImageFiles>,
    client: RetryingClient,
    max_image_bytes: usize,
}

impl SqliteCatalogStore {
    pub fn new(pool: DbPool, files: ImageFiles, client: RetryingClient) -> Self {
        Self {
            pool,
            files: Arc::new(files),
            client,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    /// Builder: cap the size of downloaded images.
    pub fn with_max_image_bytes(mut self, max: usize) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Register a catalog entry for enrichment. Returns `false` when the ID
    /// already exists.
    pub async fn import(&self, id: RequestId, name: String) -> Result<bool> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let conn = get_conn(&pool)?;
            plants::insert_pending(&conn, &id, &name)
                .with_context(|| format!("Failed to import '{name}'"))
        })
        .await
        .context("Import task failed")?
    }

    /// Entries still waiting for enrichment, oldest first.
    pub async fn pending_requests(&self) -> Result<Vec<EnrichmentRequest>> {
        let pool = self.pool.clone();
        let pending = tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = get_conn(&pool)?;
            Ok(plants::list_pending(&conn)?)
        })
        .await
        .context("Pending query task failed")??;

        Ok(pending
            .into_iter()
            .map(|p| EnrichmentRequest {
                id: p.id,
                name: p.name,
            })
            .collect())
    }

    /// Append a run's outcomes to the persisted history in one transaction.
    pub async fn record_outcomes(&self, run_id: RunId, run: &[EnrichmentOutcome]) -> Result<()> {
        let pool = self.pool.clone();
        let run = run.to_vec();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = get_conn(&pool)?;
            let tx = conn.transaction().context("Failed to begin transaction")?;
            for outcome in &run {
                outcomes::insert_outcome(
                    &tx,
                    &outcomes::NewOutcome {
                        run_id,
                        request_id: &outcome.request_id,
                        name: &outcome.name,
                        success: outcome.success,
                        cancelled: outcome.cancelled,
                        error: outcome.error.as_deref(),
                        duration_ms: outcome.duration_ms,
                        images_uploaded: u32::try_from(outcome.images_uploaded).unwrap_or(u32::MAX),
                        images_failed: u32::try_from(outcome.images_failed).unwrap_or(u32::MAX),
                        finished_at: outcome.finished_at,
                    },
                )?;
            }
            tx.commit().context("Failed to commit outcomes")?;
            Ok(())
        })
        .await
        .context("Outcome write task failed")?
    }

    /// Most recent persisted outcomes, oldest first.
    pub async fn history(&self, limit: u32) -> Result<Vec<OutcomeRecord>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = get_conn(&pool)?;
            Ok(outcomes::list_outcomes(&conn, limit)?)
        })
        .await
        .context("History query task failed")?
    }

    /// Delete the persisted history.
    pub async fn clear_history(&self) -> Result<usize> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let conn = get_conn(&pool)?;
            Ok(outcomes::clear_outcomes(&conn)?)
        })
        .await
        .context("History clear task failed")?
    }

    async fn download(&self, url: &str) -> Result<bytes::Bytes> {
        let response = self
            .client
            .send(self.client.get(url))
            .await
            .and_then(ensure_success)
            .with_context(|| format!("Failed to download image from {url}"))?;

        if let Some(len) = response.content_length() {
            if len > self.max_image_bytes as u64 {
                bail!("Image at {url} is {len} bytes, over the {} byte limit", self.max_image_bytes);
            }
        }

        let data = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read image bytes from {url}"))?;
        if data.len() > self.max_image_bytes {
            bail!("Image at {url} exceeds the {} byte limit", self.max_image_bytes);
        }
        Ok(data)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn save_fields(
        &self,
        request: &EnrichmentRequest,
        enriched: &EnrichedFields,
    ) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        let owned = request.clone();
        let enriched = enriched.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = get_conn(&pool)?;
            plants::save_enrichment(
                &conn,
                &owned.id,
                &owned.name,
                enriched.translated_name.as_deref(),
                &enriched.fields,
            )
            .with_context(|| format!("Failed to save fields for '{}'", owned.name))
        })
        .await
        .context("Save task failed")??;

        debug!(id = %request.id, "Fields saved");
        Ok(())
    }

    async fn persist_image(&self, request: &EnrichmentRequest, image: &ImageRef) -> anyhow::Result<()> {
        let data = self.download(&image.url).await?;

        let pool = self.pool.clone();
        let files = Arc::clone(&self.files);
        let request_id = request.id.clone();
        let image = image.clone();

        let image_id = tokio::task::spawn_blocking(move || -> Result<ImageId> {
            let stored = files
                .store(request_id.as_str(), &data)
                .with_context(|| format!("Failed to store image from {}", image.url))?;

            let conn = get_conn(&pool)?;
            let id = images::upsert_image(
                &conn,
                &PlantImage {
                    id: ImageId::new(),
                    plant_id: request_id,
                    source: image.source,
                    url: image.url,
                    path: stored.path,
                    thumbnail_path: Some(stored.thumbnail_path),
                    width: stored.width,
                    height: stored.height,
                    hash: stored.hash,
                    attribution: image.attribution,
                    license: image.license,
                    created_at: Utc::now(),
                },
            )
            .context("Failed to record image")?;
            Ok(id)
        })
        .await
        .context("Image store task failed")??;

        debug!(id = %request.id, image_id = %image_id, "Image persisted");
        Ok(())
    }
}
