//! Core type definitions shared by the pipeline, storage and CLI.
//!
//! All enums serialize in snake_case so events and stored records read the
//! same way in JSON and in the database.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::SourceId;

/// State of the per-item enrichment state machine.
///
/// Variants are declared in pipeline order; the derived `Ord` is what makes
/// forward-only transitions checkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Filling,
    TranslatingName,
    Saving,
    FetchingImages,
    UploadingImages,
    Done,
    Error,
}

impl PipelineStage {
    /// Returns `true` for `Done` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Filling => write!(f, "filling"),
            Self::TranslatingName => write!(f, "translating_name"),
            Self::Saving => write!(f, "saving"),
            Self::FetchingImages => write!(f, "fetching_images"),
            Self::UploadingImages => write!(f, "uploading_images"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle of one image source during discovery for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Not started for the current item.
    Idle,
    /// Query in flight.
    Loading,
    /// Query finished; images (possibly none) available.
    Done,
    /// Query failed or timed out.
    Error,
    /// Provider declined or is not configured; not an error.
    Skipped,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Reference to a remote image discovered for a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Fully-qualified URL of the full-size image.
    pub url: String,
    /// Smaller preview URL, when the provider offers one.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Provider that returned this image.
    pub source: SourceId,
    /// Credit line required by the provider, if any.
    #[serde(default)]
    pub attribution: Option<String>,
    /// License identifier (e.g. `"CC-BY-SA-4.0"`).
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl ImageRef {
    /// Create a reference with only a URL and its source.
    pub fn new(url: impl Into<String>, source: SourceId) -> Self {
        Self {
            url: url.into(),
            thumbnail_url: None,
            source,
            attribution: None,
            license: None,
            width: None,
            height: None,
        }
    }
}
