//! Metadata keys, values and document associations.

use rusqlite::{params, Connection};

use super::{Database, DatabaseError};
use crate::model::{DocumentId, MetadataEntry, MetadataValue, UserId};
use crate::rules::FilterPattern;

/// Returns the id of the user's metadata key with this name, creating it if needed.
pub fn ensure_key(db: &Database, user: UserId, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO metadata_keys (user_id, name) VALUES (?1, ?2)",
            params![user, name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM metadata_keys WHERE user_id = ?1 AND name = ?2",
            params![user, name],
            |r| r.get(0),
        )?;
        Ok(id)
    })
}

pub fn ensure_value(db: &Database, key_id: i64, value: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO metadata_values (key_id, value) VALUES (?1, ?2)",
            params![key_id, value],
        )?;
        let id = conn.query_row(
            "SELECT id FROM metadata_values WHERE key_id = ?1 AND value = ?2",
            params![key_id, value],
            |r| r.get(0),
        )?;
        Ok(id)
    })
}

pub fn set_filter(
    db: &Database,
    value_id: i64,
    filter: Option<&FilterPattern>,
) -> Result<(), DatabaseError> {
    let encoded = filter.map(serde_json::to_string).transpose()?;
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE metadata_values SET filter = ?2 WHERE id = ?1",
            params![value_id, encoded],
        )?;
        Ok(())
    })
}

/// Values of the user's keys that carry a match filter. Filters that fail to
/// decode are logged and left out.
pub fn filter_values(db: &Database, user: UserId) -> Result<Vec<MetadataValue>, DatabaseError> {
    let rows: Vec<(i64, i64, String, String)> = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT v.id, v.key_id, v.value, v.filter FROM metadata_values v
             JOIN metadata_keys k ON k.id = v.key_id
             WHERE k.user_id = ?1 AND v.filter IS NOT NULL
             ORDER BY v.id",
        )?;
        let rows = stmt
            .query_map(params![user], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    let mut values = Vec::with_capacity(rows.len());
    for (id, key_id, value, filter) in rows {
        match serde_json::from_str::<FilterPattern>(&filter) {
            Ok(filter) => values.push(MetadataValue {
                id,
                key_id,
                value,
                filter: Some(filter),
            }),
            Err(e) => log::warn!("Skipping metadata value {} with invalid filter: {}", id, e),
        }
    }
    Ok(values)
}

pub fn for_document(db: &Database, id: DocumentId) -> Result<Vec<MetadataEntry>, DatabaseError> {
    db.with_conn(|conn| load(conn, id))
}

pub(crate) fn load(conn: &Connection, id: DocumentId) -> Result<Vec<MetadataEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT dm.key_id, dm.value_id, k.name, v.value FROM document_metadata dm
         JOIN metadata_keys k ON k.id = dm.key_id
         JOIN metadata_values v ON v.id = dm.value_id
         WHERE dm.document_id = ?1
         ORDER BY k.name, v.value",
    )?;
    let entries = stmt
        .query_map(params![id], |r| {
            Ok(MetadataEntry {
                key_id: r.get(0)?,
                value_id: r.get(1)?,
                key: r.get(2)?,
                value: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(crate) fn replace(
    conn: &Connection,
    id: DocumentId,
    entries: &[MetadataEntry],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM document_metadata WHERE document_id = ?1",
        params![id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO document_metadata (document_id, key_id, value_id) VALUES (?1, ?2, ?3)",
    )?;
    for entry in entries {
        stmt.execute(params![id, entry.key_id, entry.value_id])?;
    }
    Ok(())
}
