//! Internal Rust models matching the database schema.

use std::collections::BTreeMap;

use canopy_common::{FieldKey, ImageId, RequestId, RunId, SourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog entry and whatever enrichment has been saved for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plant {
    pub id: RequestId,
    pub name: String,
    pub translated_name: Option<String>,
    /// Generated field content keyed by field; empty until enriched.
    pub fields: BTreeMap<FieldKey, serde_json::Value>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An image stored on disk for a plant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantImage {
    pub id: ImageId,
    pub plant_id: RequestId,
    pub source: SourceId,
    /// URL the image was downloaded from.
    pub url: String,
    /// Path of the original file, relative to the image root.
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Content hash (first 16 hex chars of SHA-256).
    pub hash: String,
    pub attribution: Option<String>,
    pub license: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One persisted entry of the enrichment outcome history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeRecord {
    pub seq: i64,
    pub run_id: RunId,
    pub request_id: RequestId,
    pub name: String,
    pub success: bool,
    pub cancelled: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub images_uploaded: u32,
    pub images_failed: u32,
    pub finished_at: DateTime<Utc>,
}
