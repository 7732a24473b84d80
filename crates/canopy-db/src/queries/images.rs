//! Plant image queries.

use canopy_common::{Error, ImageId, RequestId, Result, SourceId};
use rusqlite::Connection;

use super::{parse_timestamp, parse_uuid};
use crate::models::PlantImage;

/// Parse an image from a database row.
///
/// Expects columns in order: id, plant_id, source, url, path, thumbnail_path,
/// width, height, hash, attribution, license, created_at.
fn parse_image_row(row: &rusqlite::Row) -> rusqlite::Result<PlantImage> {
    Ok(PlantImage {
        id: ImageId::from(parse_uuid(0, &row.get::<_, String>(0)?)?),
        plant_id: RequestId::new(row.get::<_, String>(1)?),
        source: SourceId::new(row.get::<_, String>(2)?),
        url: row.get(3)?,
        path: row.get(4)?,
        thumbnail_path: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        hash: row.get(8)?,
        attribution: row.get(9)?,
        license: row.get(10)?,
        created_at: parse_timestamp(11, &row.get::<_, String>(11)?)?,
    })
}

/// Insert an image record, or refresh the existing record for the same
/// plant and content hash.
///
/// Returns the ID of the stored record, which is the existing ID when the
/// same content was already stored for this plant.
pub fn upsert_image(conn: &Connection, image: &PlantImage) -> Result<ImageId> {
    conn.execute(
        "INSERT INTO plant_images
             (id, plant_id, source, url, path, thumbnail_path, width, height, hash,
              attribution, license, created_at)
         VALUES
             (:id, :plant_id, :source, :url, :path, :thumbnail_path, :width, :height, :hash,
              :attribution, :license, :created_at)
         ON CONFLICT(plant_id, hash) DO UPDATE SET
             source = excluded.source,
             url = excluded.url,
             attribution = excluded.attribution,
             license = excluded.license",
        rusqlite::named_params! {
            ":id": image.id.to_string(),
            ":plant_id": image.plant_id.as_str(),
            ":source": image.source.as_str(),
            ":url": &image.url,
            ":path": &image.path,
            ":thumbnail_path": &image.thumbnail_path,
            ":width": image.width,
            ":height": image.height,
            ":hash": &image.hash,
            ":attribution": &image.attribution,
            ":license": &image.license,
            ":created_at": image.created_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let id: String = conn
        .query_row(
            "SELECT id FROM plant_images WHERE plant_id = :plant_id AND hash = :hash",
            rusqlite::named_params! {
                ":plant_id": image.plant_id.as_str(),
                ":hash": &image.hash,
            },
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    uuid::Uuid::parse_str(&id)
        .map(ImageId::from)
        .map_err(|e| Error::database(format!("Corrupt image id {id}: {e}")))
}

/// Get all images stored for a plant, oldest first.
pub fn get_images_for_plant(conn: &Connection, plant_id: &RequestId) -> Result<Vec<PlantImage>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, plant_id, source, url, path, thumbnail_path, width, height, hash,
                    attribution, license, created_at
             FROM plant_images
             WHERE plant_id = :plant_id
             ORDER BY rowid",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let images = stmt
        .query_map(
            rusqlite::named_params! { ":plant_id": plant_id.as_str() },
            parse_image_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(images)
}
