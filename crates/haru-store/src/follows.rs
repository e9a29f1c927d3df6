//! Social graph queries: directed follow edges between users.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Follow, User};
use crate::users::row_to_user;

impl Database {
    /// Create a follow edge `follower -> following`.
    ///
    /// Rejects self-follow and duplicate edges as validation errors; the
    /// uniqueness is also enforced by the schema.
    pub fn follow(&self, follower_id: i64, following_id: i64) -> Result<Follow> {
        if follower_id == following_id {
            return Err(StoreError::SelfFollow);
        }
        if self.is_following(follower_id, following_id)? {
            return Err(StoreError::DuplicateFollow);
        }

        // The target user must exist.
        self.get_user_by_id(following_id)?;

        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO follows (follower_id, following_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![follower_id, following_id, now.to_rfc3339()],
        )?;

        Ok(Follow {
            id: self.conn().last_insert_rowid(),
            follower_id,
            following_id,
            created_at: now,
        })
    }

    /// Delete the edge `follower -> following`.
    ///
    /// Removing an edge that does not exist is a [`StoreError::NotFound`],
    /// not a silent success.
    pub fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<()> {
        let affected = self.conn().execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Does the edge `follower -> following` exist?
    pub fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Users that follow `user_id`.
    pub fn followers(&self, user_id: i64) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.username, u.name, u.email, u.password_hash, u.image, u.created_at
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.following_id = ?1
             ORDER BY u.username",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: i64) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.username, u.name, u.email, u.password_hash, u.image, u.created_at
             FROM follows f JOIN users u ON u.id = f.following_id
             WHERE f.follower_id = ?1
             ORDER BY u.username",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// All edges where `user_id` is on either side, newest first.
    pub fn follow_edges_for(&self, user_id: i64) -> Result<Vec<Follow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, follower_id, following_id, created_at
             FROM follows
             WHERE follower_id = ?1 OR following_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_follow)?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }
}

fn row_to_follow(row: &rusqlite::Row<'_>) -> rusqlite::Result<Follow> {
    let ts_str: String = row.get(3)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Follow {
        id: row.get(0)?,
        follower_id: row.get(1)?,
        following_id: row.get(2)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "Alice", "", "h").unwrap();
        let bob = db.create_user("bob", "Bob", "", "h").unwrap();
        (db, alice.id, bob.id)
    }

    #[test]
    fn follow_then_is_following() {
        let (db, alice, bob) = db_with_users();
        assert!(!db.is_following(alice, bob).unwrap());

        db.follow(alice, bob).unwrap();
        assert!(db.is_following(alice, bob).unwrap());
        // Directed: the reverse edge does not exist.
        assert!(!db.is_following(bob, alice).unwrap());
    }

    #[test]
    fn self_follow_rejected() {
        let (db, alice, _) = db_with_users();
        assert!(matches!(
            db.follow(alice, alice).unwrap_err(),
            StoreError::SelfFollow
        ));
    }

    #[test]
    fn duplicate_follow_rejected() {
        let (db, alice, bob) = db_with_users();
        db.follow(alice, bob).unwrap();
        assert!(matches!(
            db.follow(alice, bob).unwrap_err(),
            StoreError::DuplicateFollow
        ));
    }

    #[test]
    fn unfollow_missing_edge_is_not_found() {
        let (db, alice, bob) = db_with_users();
        assert!(matches!(
            db.unfollow(alice, bob).unwrap_err(),
            StoreError::NotFound
        ));

        db.follow(alice, bob).unwrap();
        db.unfollow(alice, bob).unwrap();
        assert!(!db.is_following(alice, bob).unwrap());
    }

    #[test]
    fn followers_and_following_sides() {
        let (db, alice, bob) = db_with_users();
        let carol = db.create_user("carol", "Carol", "", "h").unwrap();

        db.follow(alice, bob).unwrap();
        db.follow(carol.id, bob).unwrap();

        let followers = db.followers(bob).unwrap();
        let names: Vec<&str> = followers.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);

        let following = db.following(alice).unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].username, "bob");

        let edges = db.follow_edges_for(bob).unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn follow_unknown_user_is_not_found() {
        let (db, alice, _) = db_with_users();
        assert!(matches!(
            db.follow(alice, 999).unwrap_err(),
            StoreError::NotFound
        ));
    }
}
