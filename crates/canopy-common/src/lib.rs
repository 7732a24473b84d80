//! Canopy-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across canopy:
//!
//! - **Typed IDs**: Wrappers for catalog request IDs, image source IDs, runs and images
//! - **Field schema**: The closed set of catalog fields and the categories they roll up into
//! - **Core Types**: Pipeline stages, image references and per-source statuses
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use canopy_common::{Category, Error, FieldKey, RequestId, Result};
//!
//! let id = RequestId::new("monstera-deliciosa");
//! assert_eq!(id.as_str(), "monstera-deliciosa");
//!
//! assert_eq!(FieldKey::Watering.category(), Category::Care);
//!
//! fn example() -> Result<()> {
//!     Err(Error::invalid_input("empty plant name"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod fields;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use fields::{Category, FieldKey};
pub use ids::*;
pub use types::*;
