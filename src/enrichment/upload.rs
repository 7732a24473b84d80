//! Image upload stage.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use canopy_common::ImageRef;
use futures::FutureExt;
use tracing::{debug, warn};

use super::context::StageContext;
use super::discovery::panic_message;
use super::progress::ImageUploadProgress;
use super::provider::CatalogStore;
use super::types::EnrichmentRequest;

/// Persists discovered images one by one.
pub struct ImageUploader {
    store: Arc<dyn CatalogStore>,
}

impl ImageUploader {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Upload every image, counting failures instead of stopping on them.
    ///
    /// `current` is advanced before each attempt and `uploaded`/`failed`
    /// after it; the observer sees the counters after every image.
    pub async fn upload(
        &self,
        request: &EnrichmentRequest,
        images: &[ImageRef],
        ctx: &StageContext<'_>,
    ) -> ImageUploadProgress {
        let mut progress = ImageUploadProgress::new(images.len());

        for image in images {
            progress.begin();

            let attempt = AssertUnwindSafe(self.store.persist_image(request, image))
                .catch_unwind()
                .await;
            let ok = match attempt {
                Ok(Ok(())) => {
                    debug!(id = %request.id, url = %image.url, "Image stored");
                    true
                }
                Ok(Err(e)) => {
                    warn!(id = %request.id, url = %image.url, error = %format!("{e:#}"), "Image upload failed");
                    false
                }
                Err(panic) => {
                    warn!(
                        id = %request.id,
                        url = %image.url,
                        panic = %panic_message(panic.as_ref()),
                        "Image upload panicked"
                    );
                    false
                }
            };

            progress.finish(ok);
            ctx.observer.on_image_upload_progress(&progress);
        }

        progress
    }
}
