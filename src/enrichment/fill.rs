//! Field enrichment stage.
//!
//! Fields are generated one at a time, in schema order, because every
//! request carries the fields produced so far as context.

use std::collections::BTreeMap;
use std::sync::Arc;

use canopy_common::{Error, FieldKey, PipelineStage, Result};
use tracing::{debug, instrument};

use super::context::StageContext;
use super::fields::FieldSchema;
use super::observer::FieldEvent;
use super::progress::{CategoryProgress, FieldProgress};
use super::provider::FieldProvider;

/// Generates every schema field for one entry.
pub struct FieldFiller {
    provider: Arc<dyn FieldProvider>,
    schema: FieldSchema,
}

impl FieldFiller {
    pub fn new(provider: Arc<dyn FieldProvider>, schema: FieldSchema) -> Self {
        Self { provider, schema }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Fill all fields for `plant_name`.
    ///
    /// Field and category progress start fresh on every call. The first
    /// failing field aborts the stage with an error naming it. Cancellation is
    /// checked before each field.
    #[instrument(skip(self, ctx), fields(provider = self.provider.name()))]
    pub async fn fill(
        &self,
        plant_name: &str,
        ctx: &StageContext<'_>,
    ) -> Result<BTreeMap<FieldKey, serde_json::Value>> {
        let mut progress = FieldProgress::new(self.schema.len());
        let mut categories = CategoryProgress::new(&self.schema);
        let mut generated = BTreeMap::new();

        for (category, state) in categories.iter() {
            ctx.observer.on_category_progress(category, state);
        }

        for &field in self.schema.fields() {
            ctx.check_cancelled()?;

            ctx.observer.on_field_start(&FieldEvent {
                field,
                fields_completed: progress.completed,
                total_fields: progress.total,
            });
            if let Some((category, state)) = categories.start_field(field) {
                ctx.observer.on_category_progress(category, &state);
            }

            let value = self
                .provider
                .generate(plant_name, field, &generated)
                .await
                .map_err(|e| {
                    Error::stage(PipelineStage::Filling, format!("field '{field}': {e:#}"))
                })?;
            generated.insert(field, value);

            progress.completed += 1;
            debug!(field = %field, completed = progress.completed, total = progress.total, "Field filled");
            ctx.observer.on_field_complete(&FieldEvent {
                field,
                fields_completed: progress.completed,
                total_fields: progress.total,
            });
            if let Some((category, state)) = categories.complete_field(field) {
                ctx.observer.on_category_progress(category, &state);
            }
        }

        Ok(generated)
    }
}
