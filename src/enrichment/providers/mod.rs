//! Reference HTTP implementations of the collaborator traits.

pub mod ai;
pub mod image_search;
pub mod translate;

pub use ai::HttpFieldProvider;
pub use image_search::{HttpImageSource, ImageSourceSettings};
pub use translate::HttpTranslationProvider;
