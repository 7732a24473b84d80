//! Database query modules.
//!
//! - plants: catalog entries, pending queue and atomic enrichment saves
//! - images: stored plant images
//! - outcomes: enrichment outcome history

pub mod images;
pub mod outcomes;
pub mod plants;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a UUID column.
pub(crate) fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
