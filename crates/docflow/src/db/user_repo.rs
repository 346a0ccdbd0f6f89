//! User repository. Users are identified by the name of their input
//! subdirectory.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};
use crate::model::User;

pub fn find_by_name(db: &Database, name: &str) -> Result<Option<User>, DatabaseError> {
    db.with_conn(|conn| {
        let user = conn
            .query_row(
                "SELECT id, name FROM users WHERE name = ?1",
                params![name],
                |r| {
                    Ok(User {
                        id: r.get(0)?,
                        name: r.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    })
}

/// Returns the user with this name, creating it if needed.
pub fn ensure(db: &Database, name: &str) -> Result<User, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO users (name) VALUES (?1)",
            params![name],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM users WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )?;
        Ok(User {
            id,
            name: name.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let first = ensure(&db, "alice").unwrap();
        let second = ensure(&db, "alice").unwrap();
        assert_eq!(first, second);
        assert_ne!(ensure(&db, "bob").unwrap().id, first.id);
    }

    #[test]
    fn test_find_missing_user() {
        let db = Database::open_in_memory().unwrap();
        assert!(find_by_name(&db, "nobody").unwrap().is_none());
    }
}
