//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be embedded
//! in API response types; fields that must never leave the server (the
//! password hash) are marked `skip_serializing`.

use chrono::{DateTime, NaiveDate, Utc};
use haru_sentiment::{Emotion, EmotionScore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage key of the sentinel avatar.  It is shared by every user that has
/// not uploaded a picture and is never deleted from media storage.
pub const DEFAULT_AVATAR: &str = "profile_images/default.jpg";

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    /// Unique login handle.
    pub username: String,
    /// Display name.
    pub name: String,
    pub email: String,
    /// Argon2id PHC hash of the password.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Media storage key of the avatar image.
    pub image: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Follow edge
// ---------------------------------------------------------------------------

/// Directed follow edge: `follower_id` follows `following_id`.
/// Unique per (follower, following) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Follow {
    pub id: i64,
    pub follower_id: i64,
    pub following_id: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Diary entry
// ---------------------------------------------------------------------------

/// A diary entry.  Identified by a random UUID rather than a sequence number
/// so entry ids cannot be enumerated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diary {
    pub id: Uuid,
    pub writer_id: i64,
    /// Free-text body; the input to sentiment annotation.
    pub text: String,
    /// Structured rich content (editor state), opaque to the backend.
    pub content: String,
    /// Media storage keys of attached images, in upload order.
    pub images: Vec<String>,
    /// The calendar day the entry is about.
    pub date: NaiveDate,
    /// When the entry was written.  Orders entries within the same date.
    pub created_at: DateTime<Utc>,
    /// Public entries are readable by any authenticated viewer; private ones
    /// only by their author.
    pub is_public: bool,
    /// Argmax emotion class.  `None` until a non-empty body has been saved.
    pub emotion: Option<Emotion>,
    /// Softmax distribution over all classes, as percentages.
    pub probs: Vec<EmotionScore>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment attached to a diary entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub diary_id: Uuid,
    pub writer_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
