//! Enrichment outcome history.

use canopy_common::{Error, RequestId, Result, RunId};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::{parse_timestamp, parse_uuid};
use crate::models::OutcomeRecord;

/// Fields of an outcome to append to the history.
#[derive(Debug, Clone)]
pub struct NewOutcome<'a> {
    pub run_id: RunId,
    pub request_id: &'a RequestId,
    pub name: &'a str,
    pub success: bool,
    pub cancelled: bool,
    pub error: Option<&'a str>,
    pub duration_ms: u64,
    pub images_uploaded: u32,
    pub images_failed: u32,
    pub finished_at: DateTime<Utc>,
}

fn parse_outcome_row(row: &rusqlite::Row) -> rusqlite::Result<OutcomeRecord> {
    Ok(OutcomeRecord {
        seq: row.get(0)?,
        run_id: RunId::from(parse_uuid(1, &row.get::<_, String>(1)?)?),
        request_id: RequestId::new(row.get::<_, String>(2)?),
        name: row.get(3)?,
        success: row.get(4)?,
        cancelled: row.get(5)?,
        error: row.get(6)?,
        duration_ms: row.get::<_, i64>(7)?.max(0) as u64,
        images_uploaded: row.get(8)?,
        images_failed: row.get(9)?,
        finished_at: parse_timestamp(10, &row.get::<_, String>(10)?)?,
    })
}

/// Append one outcome. Returns its sequence number.
pub fn insert_outcome(conn: &Connection, outcome: &NewOutcome<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO enrichment_outcomes
             (run_id, request_id, name, success, cancelled, error, duration_ms,
              images_uploaded, images_failed, finished_at)
         VALUES
             (:run_id, :request_id, :name, :success, :cancelled, :error, :duration_ms,
              :images_uploaded, :images_failed, :finished_at)",
        rusqlite::named_params! {
            ":run_id": outcome.run_id.to_string(),
            ":request_id": outcome.request_id.as_str(),
            ":name": outcome.name,
            ":success": outcome.success,
            ":cancelled": outcome.cancelled,
            ":error": outcome.error,
            ":duration_ms": i64::try_from(outcome.duration_ms).unwrap_or(i64::MAX),
            ":images_uploaded": outcome.images_uploaded,
            ":images_failed": outcome.images_failed,
            ":finished_at": outcome.finished_at.to_rfc3339(),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(conn.last_insert_rowid())
}

/// List the most recent outcomes, oldest first.
pub fn list_outcomes(conn: &Connection, limit: u32) -> Result<Vec<OutcomeRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT seq, run_id, request_id, name, success, cancelled, error, duration_ms,
                    images_uploaded, images_failed, finished_at
             FROM (
                 SELECT * FROM enrichment_outcomes ORDER BY seq DESC LIMIT :limit
             )
             ORDER BY seq",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let outcomes = stmt
        .query_map(
            rusqlite::named_params! { ":limit": limit },
            parse_outcome_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(outcomes)
}

/// List every outcome recorded for one run, in completion order.
pub fn list_outcomes_for_run(conn: &Connection, run_id: RunId) -> Result<Vec<OutcomeRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT seq, run_id, request_id, name, success, cancelled, error, duration_ms,
                    images_uploaded, images_failed, finished_at
             FROM enrichment_outcomes
             WHERE run_id = :run_id
             ORDER BY seq",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let outcomes = stmt
        .query_map(
            rusqlite::named_params! { ":run_id": run_id.to_string() },
            parse_outcome_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(outcomes)
}

/// Delete the whole history. Returns the number of removed entries.
pub fn clear_outcomes(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM enrichment_outcomes", [])
        .map_err(|e| Error::database(e.to_string()))
}
