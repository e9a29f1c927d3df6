//! Comments on diary entries, with their like-sets.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Comment;

impl Database {
    pub fn insert_comment(&self, diary_id: Uuid, writer_id: i64, body: &str) -> Result<Comment> {
        // The parent entry must exist.
        self.get_diary(diary_id)?;

        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO comments (diary_id, writer_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![diary_id.to_string(), writer_id, body, now.to_rfc3339()],
        )?;

        Ok(Comment {
            id: self.conn().last_insert_rowid(),
            diary_id,
            writer_id,
            body: body.to_string(),
            created_at: now,
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Comment> {
        self.conn()
            .query_row(
                "SELECT id, diary_id, writer_id, body, created_at
                 FROM comments WHERE id = ?1",
                params![id],
                row_to_comment,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All comments on an entry, newest first.
    pub fn comments_for_diary(&self, diary_id: Uuid) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, diary_id, writer_id, body, created_at
             FROM comments
             WHERE diary_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![diary_id.to_string()], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    pub fn update_comment(&self, id: i64, body: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE comments SET body = ?1 WHERE id = ?2",
            params![body, id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn delete_comment(&self, id: i64) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Toggle the viewer's membership in a comment's like-set.  Same
    /// transactional shape as the diary toggle.
    pub fn toggle_comment_like(&mut self, comment_id: i64, user_id: i64) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO comment_likes (comment_id, user_id) VALUES (?1, ?2)",
            params![comment_id, user_id],
        )?;

        let liked = if inserted == 1 {
            true
        } else {
            tx.execute(
                "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
            )?;
            false
        };

        tx.commit()?;
        Ok(liked)
    }

    pub fn comment_likers(&self, comment_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.username FROM comment_likes l JOIN users u ON u.id = l.user_id
             WHERE l.comment_id = ?1 ORDER BY u.username",
        )?;
        let rows = stmt.query_map(params![comment_id], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    pub fn comment_like_count(&self, comment_id: i64) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
            params![comment_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let diary_id_str: String = row.get(1)?;
    let diary_id = Uuid::parse_str(&diary_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let ts_str: String = row.get(4)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Comment {
        id: row.get(0)?,
        diary_id,
        writer_id: row.get(2)?,
        body: row.get(3)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diaries::NewDiary;

    fn db_with_diary() -> (Database, i64, i64, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "Alice", "", "h").unwrap();
        let bob = db.create_user("bob", "Bob", "", "h").unwrap();
        let diary = db
            .insert_diary(NewDiary {
                writer_id: alice.id,
                text: "today".to_string(),
                content: String::new(),
                images: Vec::new(),
                date: "2024-01-01".parse().unwrap(),
                is_public: true,
                annotation: None,
            })
            .unwrap();
        (db, alice.id, bob.id, diary.id)
    }

    #[test]
    fn comment_round_trip() {
        let (db, _, bob, diary_id) = db_with_diary();

        let comment = db.insert_comment(diary_id, bob, "nice day!").unwrap();
        let loaded = db.get_comment(comment.id).unwrap();
        assert_eq!(loaded, comment);

        db.update_comment(comment.id, "a really nice day").unwrap();
        assert_eq!(db.get_comment(comment.id).unwrap().body, "a really nice day");
    }

    #[test]
    fn comment_on_missing_diary_is_not_found() {
        let (db, _, bob, _) = db_with_diary();
        let err = db.insert_comment(Uuid::new_v4(), bob, "hello").unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn comments_listed_newest_first() {
        let (db, alice, bob, diary_id) = db_with_diary();

        let c1 = db.insert_comment(diary_id, bob, "first").unwrap();
        let c2 = db.insert_comment(diary_id, alice, "second").unwrap();

        let comments = db.comments_for_diary(diary_id).unwrap();
        assert_eq!(comments.len(), 2);
        // Insertion timestamps are monotonic within the test, so the later
        // comment comes first.
        assert!(c2.created_at >= c1.created_at);
        assert_eq!(comments[0].id, c2.id);
    }

    #[test]
    fn comment_like_toggle_is_an_involution() {
        let (mut db, alice, bob, diary_id) = db_with_diary();
        let comment = db.insert_comment(diary_id, alice, "hello").unwrap();

        assert!(db.toggle_comment_like(comment.id, bob).unwrap());
        assert_eq!(db.comment_like_count(comment.id).unwrap(), 1);
        assert_eq!(db.comment_likers(comment.id).unwrap(), vec!["bob"]);

        assert!(!db.toggle_comment_like(comment.id, bob).unwrap());
        assert_eq!(db.comment_like_count(comment.id).unwrap(), 0);
    }

    #[test]
    fn deleting_diary_cascades_to_comments() {
        let (db, _, bob, diary_id) = db_with_diary();
        let comment = db.insert_comment(diary_id, bob, "bye").unwrap();

        db.delete_diary(diary_id).unwrap();
        assert!(matches!(
            db.get_comment(comment.id).unwrap_err(),
            StoreError::NotFound
        ));
    }
}
