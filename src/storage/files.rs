//! On-disk image files.
//!
//! Images are stored under `{base_dir}/{entry}/` as `{hash}.jpg` plus a
//! `{hash}_thumb.jpg` preview, where `hash` is the first 16 hex characters of
//! the SHA-256 of the downloaded bytes. Storing the same bytes twice for the
//! same entry rewrites the same files.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};

/// Width of generated thumbnails when none is configured.
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;

/// Result of storing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Content hash (first 16 hex chars of SHA-256).
    pub hash: String,
    pub width: u32,
    pub height: u32,
    /// Original, relative to the base directory.
    pub path: String,
    /// Thumbnail, relative to the base directory.
    pub thumbnail_path: String,
}

/// Filesystem manager for downloaded images.
#[derive(Debug, Clone)]
pub struct ImageFiles {
    base_dir: PathBuf,
    thumbnail_width: u32,
}

impl ImageFiles {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
        }
    }

    /// Builder: set the thumbnail width (clamped to at least 1 pixel).
    pub fn with_thumbnail_width(mut self, width: u32) -> Self {
        self.thumbnail_width = width.max(1);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Decode `data`, then write it as JPEG together with a thumbnail.
    ///
    /// Fails if the bytes are not a decodable image.
    pub fn store(&self, entry_id: &str, data: &[u8]) -> Result<StoredImage> {
        let hash = compute_hash(data);

        let img = image::load_from_memory(data).context("Failed to decode image data")?;
        let (width, height) = (img.width(), img.height());

        let dir_name = sanitize_dir_name(entry_id);
        let entry_dir = self.base_dir.join(&dir_name);
        std::fs::create_dir_all(&entry_dir).with_context(|| {
            format!("Failed to create image directory: {}", entry_dir.display())
        })?;

        let original = format!("{hash}.jpg");
        write_jpeg(&img, &entry_dir.join(&original))?;

        let thumbnail = format!("{hash}_thumb.jpg");
        let thumb_img = if width > self.thumbnail_width {
            img.resize(self.thumbnail_width, u32::MAX, FilterType::Lanczos3)
        } else {
            img
        };
        write_jpeg(&thumb_img, &entry_dir.join(&thumbnail))?;

        Ok(StoredImage {
            hash,
            width,
            height,
            path: format!("{dir_name}/{original}"),
            thumbnail_path: format!("{dir_name}/{thumbnail}"),
        })
    }

    /// Absolute path of a stored file given its relative path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }
}

/// JPEG has no alpha channel, so everything is flattened to RGB first.
fn write_jpeg(img: &DynamicImage, path: &Path) -> Result<()> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Jpeg)
        .context("Failed to encode image as JPEG")?;
    std::fs::write(path, buf.into_inner())
        .with_context(|| format!("Failed to write image file: {}", path.display()))
}

/// First 16 hex characters of the SHA-256 of `data`.
pub fn compute_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)[..16].to_string()
}

/// Turn a caller-chosen entry ID into a single safe path component.
fn sanitize_dir_name(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
