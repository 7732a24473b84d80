mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::enrichment::FieldSchema;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./canopy.toml",
        "~/.config/canopy/config.toml",
        "/etc/canopy/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// The field schema the config selects.
pub fn field_schema(config: &Config) -> Result<FieldSchema> {
    match &config.fields {
        Some(fields) => FieldSchema::new(fields.clone()).context("Invalid `fields` list"),
        None => Ok(FieldSchema::full()),
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.storage.thumbnail_width == 0 {
        anyhow::bail!("storage.thumbnail_width cannot be 0");
    }

    if config.http.attempt_timeout_secs == 0 {
        anyhow::bail!("http.attempt_timeout_secs cannot be 0");
    }
    if config.http.base_delay_ms > config.http.max_delay_ms {
        anyhow::bail!(
            "http.base_delay_ms ({}) exceeds http.max_delay_ms ({})",
            config.http.base_delay_ms,
            config.http.max_delay_ms
        );
    }

    if config.translation.enabled && config.translation.endpoint.is_none() {
        anyhow::bail!("Translation is enabled but has no endpoint");
    }

    let images = &config.images;
    if images.source_timeout_secs == 0 {
        anyhow::bail!("images.source_timeout_secs cannot be 0");
    }
    if images.max_per_source == 0 {
        anyhow::bail!("images.max_per_source cannot be 0");
    }
    if images.max_per_item == 0 {
        anyhow::bail!("images.max_per_item cannot be 0");
    }

    let mut seen = HashSet::new();
    for source in &images.sources {
        if source.id.trim().is_empty() {
            anyhow::bail!("Image source with endpoint '{}' has an empty id", source.endpoint);
        }
        if !seen.insert(source.id.as_str()) {
            anyhow::bail!("Image source '{}' is configured twice", source.id);
        }
        if source.enabled && source.requires_api_key && source.api_key.is_none() {
            tracing::warn!(source = %source.id, "Image source requires an API key; it will be skipped");
        }
    }

    field_schema(config)?;

    Ok(())
}
