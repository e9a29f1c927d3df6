use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{User, DEFAULT_AVATAR};

/// True when a rusqlite error is a UNIQUE constraint violation.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Database {
    /// Insert a new account.  The avatar starts as the sentinel image.
    ///
    /// Returns [`StoreError::DuplicateUsername`] when the handle is taken.
    pub fn create_user(
        &self,
        username: &str,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let now = Utc::now();

        self.conn()
            .execute(
                "INSERT INTO users (username, name, email, password_hash, image, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    username,
                    name,
                    email,
                    password_hash,
                    DEFAULT_AVATAR,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateUsername
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        let id = self.conn().last_insert_rowid();

        Ok(User {
            id,
            username: username.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            image: DEFAULT_AVATAR.to_string(),
            created_at: now,
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, name, email, password_hash, image, created_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, name, email, password_hash, image, created_at
                 FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(not_found)
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Persist profile mutations (username, display name, email, avatar key).
    /// The password hash is never touched here.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let affected = self
            .conn()
            .execute(
                "UPDATE users SET username = ?1, name = ?2, email = ?3, image = ?4
                 WHERE id = ?5",
                params![user.username, user.name, user.email, user.image, user.id],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateUsername
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove an account.  Owned diaries, comments, follow edges and likes
    /// are deleted by the cascading foreign keys.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn not_found(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let ts_str: String = row.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        image: row.get(5)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn create_and_fetch_user() {
        let db = test_db();
        let user = db
            .create_user("alice", "Alice", "alice@example.com", "$argon2id$fake")
            .unwrap();

        assert_eq!(user.image, DEFAULT_AVATAR);

        let by_id = db.get_user_by_id(user.id).unwrap();
        assert_eq!(by_id.username, "alice");

        let by_name = db.get_user_by_username("alice").unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = test_db();
        db.create_user("alice", "Alice", "", "h").unwrap();

        let err = db.create_user("alice", "Other", "", "h").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[test]
    fn username_exists_check() {
        let db = test_db();
        assert!(!db.username_exists("bob").unwrap());
        db.create_user("bob", "Bob", "", "h").unwrap();
        assert!(db.username_exists("bob").unwrap());
    }

    #[test]
    fn update_profile_fields() {
        let db = test_db();
        let mut user = db.create_user("carol", "Carol", "", "h").unwrap();

        user.name = "Caroline".to_string();
        user.image = "profile_images/abc.png".to_string();
        db.update_user(&user).unwrap();

        let reloaded = db.get_user_by_id(user.id).unwrap();
        assert_eq!(reloaded.name, "Caroline");
        assert_eq!(reloaded.image, "profile_images/abc.png");
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.get_user_by_id(999).unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            db.delete_user(999).unwrap_err(),
            StoreError::NotFound
        ));
    }
}
