//! Reference catalog persistence: SQLite records plus image files on disk.

mod files;
mod store;

pub use files::{compute_hash, ImageFiles, StoredImage, DEFAULT_THUMBNAIL_WIDTH};
pub use store::{SqliteCatalogStore, DEFAULT_MAX_IMAGE_BYTES};
