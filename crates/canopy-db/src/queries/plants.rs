//! Plant (catalog entry) queries.
//!
//! Pending entries are plants that have never been enriched
//! (`enriched_at IS NULL`). Saving an enrichment is a single UPSERT, so it is
//! either fully committed or not at all.

use std::collections::BTreeMap;

use canopy_common::{Error, FieldKey, RequestId, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::parse_timestamp;
use crate::models::Plant;

const PLANT_COLUMNS: &str = "id, name, translated_name, fields, enriched_at, created_at";

/// Parse a plant from a database row.
///
/// Expects columns in order: id, name, translated_name, fields, enriched_at, created_at.
fn parse_plant_row(row: &rusqlite::Row) -> rusqlite::Result<Plant> {
    let fields_json: String = row.get(3)?;
    let fields: BTreeMap<FieldKey, serde_json::Value> = serde_json::from_str(&fields_json)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let enriched_at = row
        .get::<_, Option<String>>(4)?
        .map(|s| parse_timestamp(4, &s))
        .transpose()?;

    Ok(Plant {
        id: RequestId::new(row.get::<_, String>(0)?),
        name: row.get(1)?,
        translated_name: row.get(2)?,
        fields,
        enriched_at,
        created_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
    })
}

/// Insert a plant awaiting enrichment.
///
/// Returns `false` when a plant with this ID already exists (it is left
/// untouched).
pub fn insert_pending(conn: &Connection, id: &RequestId, name: &str) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO plants (id, name, fields, created_at)
             VALUES (:id, :name, '{}', :created_at)",
            rusqlite::named_params! {
                ":id": id.as_str(),
                ":name": name,
                ":created_at": Utc::now().to_rfc3339(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(inserted == 1)
}

/// Get a plant by ID.
pub fn get_plant(conn: &Connection, id: &RequestId) -> Result<Option<Plant>> {
    conn.query_row(
        &format!("SELECT {PLANT_COLUMNS} FROM plants WHERE id = :id"),
        rusqlite::named_params! { ":id": id.as_str() },
        parse_plant_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List plants that have not been enriched yet, in insertion order.
pub fn list_pending(conn: &Connection) -> Result<Vec<Plant>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PLANT_COLUMNS} FROM plants WHERE enriched_at IS NULL ORDER BY rowid"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let plants = stmt
        .query_map([], parse_plant_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(plants)
}

/// Persist generated fields and the translated name for a plant.
///
/// Creates the plant row if it does not exist yet. The whole record is
/// written by one statement.
pub fn save_enrichment(
    conn: &Connection,
    id: &RequestId,
    name: &str,
    translated_name: Option<&str>,
    fields: &BTreeMap<FieldKey, serde_json::Value>,
) -> Result<()> {
    let fields_json = serde_json::to_string(fields)
        .map_err(|e| Error::internal(format!("Failed to serialize fields: {e}")))?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO plants (id, name, translated_name, fields, enriched_at, created_at)
         VALUES (:id, :name, :translated_name, :fields, :now, :now)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             translated_name = excluded.translated_name,
             fields = excluded.fields,
             enriched_at = excluded.enriched_at",
        rusqlite::named_params! {
            ":id": id.as_str(),
            ":name": name,
            ":translated_name": translated_name,
            ":fields": fields_json,
            ":now": now,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}
