//! Tag repository.

use rusqlite::{params, Connection};

use super::{Database, DatabaseError};
use crate::model::{DocumentId, TagRef, UserId};

/// Returns the id of the user's tag with this name, creating it if needed.
pub fn ensure(db: &Database, user: UserId, name: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO tags (user_id, name) VALUES (?1, ?2)",
            params![user, name],
        )?;
        let id = conn.query_row(
            "SELECT id FROM tags WHERE user_id = ?1 AND name = ?2",
            params![user, name],
            |r| r.get(0),
        )?;
        Ok(id)
    })
}

pub fn for_document(db: &Database, id: DocumentId) -> Result<Vec<TagRef>, DatabaseError> {
    db.with_conn(|conn| load(conn, id))
}

pub(crate) fn load(conn: &Connection, id: DocumentId) -> Result<Vec<TagRef>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM document_tags dt
         JOIN tags t ON t.id = dt.tag_id
         WHERE dt.document_id = ?1
         ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map(params![id], |r| {
            Ok(TagRef {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Replaces the document's tag associations. Duplicate ids collapse.
pub(crate) fn replace(
    conn: &Connection,
    id: DocumentId,
    tags: &[TagRef],
) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM document_tags WHERE document_id = ?1", params![id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO document_tags (document_id, tag_id) VALUES (?1, ?2)")?;
    for tag in tags {
        stmt.execute(params![id, tag.id])?;
    }
    Ok(())
}
