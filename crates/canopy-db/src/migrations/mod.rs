//! Catalog schema upgrades.
//!
//! The schema version lives in SQLite's `user_version` header field, so a
//! catalog file carries its own version without a bookkeeping table. Each
//! step runs in a transaction together with the version bump.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema step {version} failed: {source}")]
    Step {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// The catalog was written by a newer canopy.
    #[error("Catalog schema version {found} is newer than supported version {supported}")]
    TooNew { found: u32, supported: u32 },
}

/// Schema steps; entry `i` upgrades the catalog to version `i + 1`.
const STEPS: &[&str] = &[include_str!("001_initial.sql")];

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = STEPS.len() as u32;

/// The catalog's recorded schema version (0 for a fresh file).
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Bring the catalog up to [`SCHEMA_VERSION`], returning how many steps ran.
///
/// Refuses catalogs with a version above [`SCHEMA_VERSION`] instead of
/// writing rows an older layout would misread.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    conn.pragma_update(None, "foreign_keys", true)?;

    let found = schema_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(MigrationError::TooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    let mut applied = 0;
    for (version, sql) in (1..=SCHEMA_VERSION).zip(STEPS).skip(found as usize) {
        let step = |source| MigrationError::Step { version, source };
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(step)?;
        tx.pragma_update(None, "user_version", version).map_err(step)?;
        tx.commit().map_err(step)?;
        applied += 1;
    }

    Ok(applied)
}
