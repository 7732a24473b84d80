//! Generic JSON image search provider.
//!
//! Queries `GET {endpoint}?q=<term>&limit=<n>` and expects
//!
//! ```json
//! { "images": [ { "url": "...", "thumbnail_url": "...", "attribution": "...",
//!                 "license": "...", "width": 800, "height": 600 } ],
//!   "declined": null }
//! ```
//!
//! Features:
//! - Token-bucket rate limiting per source via [`governor`].
//! - Retries through the shared [`RetryingClient`].
//! - Reports itself unavailable when an API key is required but missing.

use std::num::NonZeroU32;

use anyhow::Context;
use async_trait::async_trait;
use canopy_common::{ImageRef, SourceId};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tracing::debug;

use crate::enrichment::provider::{ImageSearch, ImageSourceProvider};
use crate::http::{ensure_success, RetryingClient};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    images: Vec<SearchHit>,
    #[serde(default)]
    declined: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    attribution: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Settings for one [`HttpImageSource`].
#[derive(Debug, Clone)]
pub struct ImageSourceSettings {
    pub id: SourceId,
    pub label: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// When set, the source is skipped unless `api_key` is present.
    pub requires_api_key: bool,
    pub requests_per_second: NonZeroU32,
}

/// Image search provider speaking the generic JSON contract.
pub struct HttpImageSource {
    client: RetryingClient,
    settings: ImageSourceSettings,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpImageSource {
    pub fn new(client: RetryingClient, settings: ImageSourceSettings) -> Self {
        let rate_limiter = RateLimiter::direct(Quota::per_second(settings.requests_per_second));
        Self {
            client,
            settings,
            rate_limiter,
        }
    }
}

#[async_trait]
impl ImageSourceProvider for HttpImageSource {
    fn id(&self) -> &SourceId {
        &self.settings.id
    }

    fn label(&self) -> &str {
        &self.settings.label
    }

    fn is_available(&self) -> bool {
        !self.settings.requires_api_key
            || self
                .settings
                .api_key
                .as_deref()
                .is_some_and(|k| !k.is_empty())
    }

    async fn search(&self, term: &str, limit: usize) -> anyhow::Result<ImageSearch> {
        self.rate_limiter.until_ready().await;

        let limit = limit.to_string();
        let mut request = self
            .client
            .get(&self.settings.endpoint)
            .query(&[("q", term), ("limit", limit.as_str())]);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = self
            .client
            .send(request)
            .await
            .and_then(ensure_success)
            .with_context(|| format!("{} search failed", self.settings.label))?;

        let body: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("{} returned malformed JSON", self.settings.label))?;

        if let Some(reason) = body.declined {
            debug!(source = %self.settings.id, term, reason = %reason, "Search declined");
            return Ok(ImageSearch::Declined(reason));
        }

        let images = body
            .images
            .into_iter()
            .filter(|hit| !hit.url.is_empty())
            .map(|hit| ImageRef {
                url: hit.url,
                thumbnail_url: hit.thumbnail_url,
                source: self.settings.id.clone(),
                attribution: hit.attribution,
                license: hit.license,
                width: hit.width,
                height: hit.height,
            })
            .collect::<Vec<_>>();

        debug!(source = %self.settings.id, term, count = images.len(), "Search complete");
        Ok(ImageSearch::Found(images))
    }
}
