//! Document repository: CRUD for the `documents` table plus its tag and
//! metadata associations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{from_ts, metadata_repo, now, tag_repo, to_ts, Database, DatabaseError};
use crate::model::{Document, DocumentId};

const COLUMNS: &str =
    "id, user_id, name, description, content, filename, hash, mimetype, size, date";

fn from_row(row: &Row<'_>) -> Result<Document, rusqlite::Error> {
    let size: i64 = row.get("size")?;
    Ok(Document {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        content: row.get("content")?,
        filename: row.get("filename")?,
        hash: row.get("hash")?,
        mimetype: row.get("mimetype")?,
        size: size.max(0) as u64,
        date: from_ts(row.get("date")?),
        tags: Vec::new(),
        metadata: Vec::new(),
    })
}

fn with_associations(conn: &Connection, doc: Option<Document>) -> Result<Option<Document>, DatabaseError> {
    match doc {
        Some(mut doc) => {
            doc.tags = tag_repo::load(conn, doc.id)?;
            doc.metadata = metadata_repo::load(conn, doc.id)?;
            Ok(Some(doc))
        }
        None => Ok(None),
    }
}

/// Inserts a new document row and returns its id. Tags and metadata on the
/// document are stored as well.
pub fn insert(db: &Database, doc: &Document) -> Result<DocumentId, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let ts = now();
        tx.execute(
            "INSERT INTO documents (user_id, name, description, content, filename, hash,
             mimetype, size, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                doc.user_id,
                doc.name,
                doc.description,
                doc.content,
                doc.filename,
                doc.hash,
                doc.mimetype,
                doc.size as i64,
                to_ts(doc.date),
                ts,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tag_repo::replace(&tx, id, &doc.tags)?;
        metadata_repo::replace(&tx, id, &doc.metadata)?;
        tx.commit()?;
        Ok(id)
    })
}

/// Overwrites every scalar field and replaces the associations.
pub fn update(db: &Database, doc: &Document) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE documents SET name=?2, description=?3, content=?4, filename=?5, hash=?6,
             mimetype=?7, size=?8, date=?9, updated_at=?10
             WHERE id=?1",
            params![
                doc.id,
                doc.name,
                doc.description,
                doc.content,
                doc.filename,
                doc.hash,
                doc.mimetype,
                doc.size as i64,
                to_ts(doc.date),
                now(),
            ],
        )?;
        tag_repo::replace(&tx, doc.id, &doc.tags)?;
        metadata_repo::replace(&tx, doc.id, &doc.metadata)?;
        tx.commit()?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: DocumentId) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )
            .optional()?;
        with_associations(conn, doc)
    })
}

pub fn find_by_hash(db: &Database, hash: &str) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE hash = ?1", COLUMNS),
                params![hash],
                from_row,
            )
            .optional()?;
        with_associations(conn, doc)
    })
}

/// Deletes the row; tags, metadata, steps and jobs go with it.
pub fn delete(db: &Database, id: DocumentId) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(())
    })
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
        Ok(count.max(0) as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{metadata_repo, tag_repo, user_repo};

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = user_repo::ensure(&db, "alice").unwrap();
        (db, user.id)
    }

    #[test]
    fn test_insert_and_find() {
        let (db, user) = setup();
        let doc = Document::new(user, "invoice.pdf", "application/pdf", 1234, "abc123");
        let id = insert(&db, &doc).unwrap();

        let found = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "invoice");
        assert_eq!(found.size, 1234);
        assert_eq!(found.date, None);

        let by_hash = find_by_hash(&db, "abc123").unwrap().unwrap();
        assert_eq!(by_hash.id, id);
        assert!(find_by_hash(&db, "other").unwrap().is_none());
    }

    #[test]
    fn test_update_replaces_associations_and_loads_names() {
        let (db, user) = setup();
        let id = insert(&db, &Document::new(user, "a.pdf", "application/pdf", 1, "h1")).unwrap();

        let tag = tag_repo::ensure(&db, user, "finance").unwrap();
        let key = metadata_repo::ensure_key(&db, user, "customer").unwrap();
        let value = metadata_repo::ensure_value(&db, key, "ACME").unwrap();

        let mut doc = find_by_id(&db, id).unwrap().unwrap();
        doc.name = "Renamed".to_string();
        doc.date = Some(chrono::Utc::now());
        doc.add_metadata(key, value);
        doc.tags.push(crate::model::TagRef {
            id: tag,
            name: String::new(),
        });
        doc.tags.push(crate::model::TagRef {
            id: tag,
            name: String::new(),
        });
        update(&db, &doc).unwrap();

        let loaded = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert!(loaded.date.is_some());
        assert_eq!(loaded.tags.len(), 1);
        assert_eq!(loaded.tags[0].name, "finance");
        assert_eq!(loaded.metadata.len(), 1);
        assert_eq!(loaded.metadata[0].key, "customer");
        assert_eq!(loaded.metadata[0].value, "ACME");
    }

    #[test]
    fn test_duplicate_hash_is_rejected() {
        let (db, user) = setup();
        insert(&db, &Document::new(user, "a.pdf", "application/pdf", 1, "same")).unwrap();
        let err = insert(&db, &Document::new(user, "b.pdf", "application/pdf", 1, "same"))
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(count(&db).unwrap(), 1);
    }

    #[test]
    fn test_delete_removes_row() {
        let (db, user) = setup();
        let id = insert(&db, &Document::new(user, "a.pdf", "application/pdf", 1, "h")).unwrap();
        delete(&db, id).unwrap();
        assert!(find_by_id(&db, id).unwrap().is_none());
        assert_eq!(count(&db).unwrap(), 0);
    }
}
