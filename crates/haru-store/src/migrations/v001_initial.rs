//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `users`, `follows`, `diaries`, `comments`, and
//! the two like-set tables `diary_likes` / `comment_likes`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL,
    image         TEXT NOT NULL DEFAULT 'profile_images/default.jpg',
    created_at    TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Follow edges (directed, unique per pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS follows (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    follower_id  INTEGER NOT NULL,
    following_id INTEGER NOT NULL,
    created_at   TEXT NOT NULL,

    UNIQUE (follower_id, following_id),
    FOREIGN KEY (follower_id)  REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (following_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_follows_pair ON follows(follower_id, following_id);
CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);

-- ----------------------------------------------------------------
-- Diary entries
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS diaries (
    id         TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    writer_id  INTEGER NOT NULL,
    text       TEXT NOT NULL,
    content    TEXT NOT NULL DEFAULT '',
    images     TEXT NOT NULL DEFAULT '[]',     -- JSON array of media keys
    date       TEXT NOT NULL,                  -- YYYY-MM-DD
    created_at TEXT NOT NULL,                  -- ISO-8601
    is_public  INTEGER NOT NULL DEFAULT 1,     -- boolean 0/1
    emotion    INTEGER,                        -- nullable class index 0..4
    probs      TEXT NOT NULL DEFAULT '[]',     -- JSON probability vector

    FOREIGN KEY (writer_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_diaries_date ON diaries(date);
CREATE INDEX IF NOT EXISTS idx_diaries_writer ON diaries(writer_id);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    diary_id   TEXT NOT NULL,
    writer_id  INTEGER NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (diary_id)  REFERENCES diaries(id) ON DELETE CASCADE,
    FOREIGN KEY (writer_id) REFERENCES users(id)   ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_diary_ts
    ON comments(diary_id, created_at DESC);

-- ----------------------------------------------------------------
-- Like-sets.  The composite primary key is the uniqueness guard the
-- atomic toggle relies on.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS diary_likes (
    diary_id TEXT NOT NULL,
    user_id  INTEGER NOT NULL,

    PRIMARY KEY (diary_id, user_id),
    FOREIGN KEY (diary_id) REFERENCES diaries(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)  REFERENCES users(id)   ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS comment_likes (
    comment_id INTEGER NOT NULL,
    user_id    INTEGER NOT NULL,

    PRIMARY KEY (comment_id, user_id),
    FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)    REFERENCES users(id)    ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
