use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use canopy_common::FieldKey;
use serde::{Deserialize, Serialize};

use crate::enrichment::DiscoverySettings;
use crate::http::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    /// Restrict generation to these fields, in this order (default: all).
    #[serde(default)]
    pub fields: Option<Vec<FieldKey>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Holds `catalog.sqlite` and the `images/` tree. Tilde-expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.local/share/canopy")
}

fn default_thumbnail_width() -> u32 {
    crate::storage::DEFAULT_THUMBNAIL_WIDTH
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            thumbnail_width: default_thumbnail_width(),
        }
    }
}

impl StorageConfig {
    /// `data_dir` with a leading `~` expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        let raw = self.data_dir.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolved_data_dir().join("catalog.sqlite")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.resolved_data_dir().join("images")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_attempt_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiConfig {
    /// Content generation endpoint. Required for `canopy run`.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranslationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_target_language")]
    pub target_language: String,
}

fn default_target_language() -> String {
    "en".to_string()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            target_language: default_target_language(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesConfig {
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,

    #[serde(default = "default_max_per_item")]
    pub max_per_item: usize,

    /// Queried concurrently; selection keeps this order.
    #[serde(default)]
    pub sources: Vec<ImageSourceConfig>,
}

fn default_source_timeout_secs() -> u64 {
    15
}
fn default_max_per_source() -> usize {
    3
}
fn default_max_per_item() -> usize {
    6
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout_secs(),
            max_per_source: default_max_per_source(),
            max_per_item: default_max_per_item(),
            sources: Vec::new(),
        }
    }
}

impl ImagesConfig {
    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            source_timeout: Duration::from_secs(self.source_timeout_secs),
            max_per_source: self.max_per_source,
            max_per_item: self.max_per_item,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSourceConfig {
    pub id: String,

    /// Display name (defaults to the id).
    #[serde(default)]
    pub label: Option<String>,

    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Skip the source while no API key is set.
    #[serde(default)]
    pub requires_api_key: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: NonZeroU32,
}

fn default_enabled() -> bool {
    true
}

fn default_requests_per_second() -> NonZeroU32 {
    NonZeroU32::MIN.saturating_add(1)
}
