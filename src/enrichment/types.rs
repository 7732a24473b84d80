//! Inputs and results of the enrichment pipeline.

use std::collections::BTreeMap;

use canopy_common::{FieldKey, ImageRef, RequestId, RunId, SourceId, SourceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One catalog entry queued for enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub id: RequestId,
    pub name: String,
}

impl EnrichmentRequest {
    pub fn new(id: impl Into<RequestId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Content produced by the field and translation stages for one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFields {
    pub translated_name: Option<String>,
    pub fields: BTreeMap<FieldKey, serde_json::Value>,
}

/// Final result for one entry of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub request_id: RequestId,
    pub name: String,
    pub success: bool,
    /// The entry stopped at a stage boundary because the run was cancelled.
    pub cancelled: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub images_uploaded: usize,
    pub images_failed: usize,
    pub finished_at: DateTime<Utc>,
}

/// Result of querying one image source for one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSourceResult {
    pub source: SourceId,
    pub label: String,
    pub images: Vec<ImageRef>,
    pub status: SourceStatus,
    pub error: Option<String>,
}

impl ImageSourceResult {
    /// A result that has not started yet.
    pub fn idle(source: SourceId, label: impl Into<String>) -> Self {
        Self {
            source,
            label: label.into(),
            images: Vec::new(),
            status: SourceStatus::Idle,
            error: None,
        }
    }
}

/// Summary returned when a run ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// Outcomes of this run only, in completion order.
    pub outcomes: Vec<EnrichmentOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    /// The run was cancelled before the queue was exhausted.
    pub cancelled: bool,
    pub processed: usize,
    /// Entries never started because of cancellation.
    pub skipped: usize,
    pub duration_ms: u64,
}
