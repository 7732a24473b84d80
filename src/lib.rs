//! Canopy - bulk AI content enrichment for a plant catalog
//!
//! This library crate exposes the enrichment pipeline, its HTTP providers and
//! the reference SQLite store for the binary and for integration testing.

pub mod config;
pub mod enrichment;
pub mod http;
pub mod setup;
pub mod storage;
