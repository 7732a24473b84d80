//! Wires configuration into a ready-to-run orchestrator.

use std::sync::Arc;

use anyhow::{Context, Result};
use canopy_common::SourceId;
use canopy_db::pool::{init_pool, DbPool};

use crate::config::{field_schema, Config};
use crate::enrichment::providers::{
    HttpFieldProvider, HttpImageSource, HttpTranslationProvider, ImageSourceSettings,
};
use crate::enrichment::{
    FieldFiller, ImageDiscovery, ImageSourceProvider, ItemPipeline, QueueOrchestrator,
};
use crate::http::RetryingClient;
use crate::storage::{ImageFiles, SqliteCatalogStore};

/// Open (creating if needed) the catalog database under the data directory.
pub fn open_database(config: &Config) -> Result<DbPool> {
    let data_dir = config.storage.resolved_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let db_path = config.storage.database_path();
    tracing::debug!("Opening catalog database at {}", db_path.display());
    let pool = init_pool(&db_path.to_string_lossy())
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    Ok(pool)
}

pub fn build_client(config: &Config) -> Result<RetryingClient> {
    RetryingClient::new(config.http.retry_policy()).context("Failed to build HTTP client")
}

pub fn build_store(config: &Config, pool: DbPool, client: RetryingClient) -> SqliteCatalogStore {
    let files = ImageFiles::new(config.storage.images_dir())
        .with_thumbnail_width(config.storage.thumbnail_width);
    SqliteCatalogStore::new(pool, files, client)
}

/// Image sources enabled in the config, in config order.
pub fn build_sources(config: &Config, client: &RetryingClient) -> Vec<Arc<dyn ImageSourceProvider>> {
    config
        .images
        .sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| {
            let settings = ImageSourceSettings {
                id: SourceId::new(s.id.clone()),
                label: s.label.clone().unwrap_or_else(|| s.id.clone()),
                endpoint: s.endpoint.clone(),
                api_key: s.api_key.clone(),
                requires_api_key: s.requires_api_key,
                requests_per_second: s.requests_per_second,
            };
            Arc::new(HttpImageSource::new(client.clone(), settings)) as Arc<dyn ImageSourceProvider>
        })
        .collect()
}

/// Build the orchestrator over `store` using the HTTP providers from `config`.
pub fn build_orchestrator(
    config: &Config,
    client: &RetryingClient,
    store: Arc<SqliteCatalogStore>,
) -> Result<QueueOrchestrator> {
    let endpoint = config
        .ai
        .endpoint
        .clone()
        .context("No AI endpoint configured; set [ai].endpoint")?;
    let provider = HttpFieldProvider::new(client.clone(), endpoint, config.ai.api_key.clone());
    let filler = FieldFiller::new(Arc::new(provider), field_schema(config)?);

    let discovery = ImageDiscovery::new(
        build_sources(config, client),
        config.images.discovery_settings(),
    )?;

    let mut pipeline = ItemPipeline::new(filler, store, discovery);

    if config.translation.enabled {
        let endpoint = config
            .translation
            .endpoint
            .clone()
            .context("Translation is enabled but has no endpoint")?;
        pipeline = pipeline.with_translator(Arc::new(HttpTranslationProvider::new(
            client.clone(),
            endpoint,
            config.translation.api_key.clone(),
            config.translation.target_language.clone(),
        )));
    }

    Ok(QueueOrchestrator::new(pipeline))
}
