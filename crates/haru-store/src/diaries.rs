//! Diary entries: CRUD, the visibility & query engine, and the like toggle.
//!
//! Every read path that can return someone else's entry goes through the
//! same visibility predicate: an entry is visible to a viewer iff it is
//! public or the viewer wrote it.  Following an author does not unlock
//! their private entries.

use chrono::{DateTime, NaiveDate, Utc};
use haru_sentiment::{Annotation, Emotion, EmotionScore};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Diary;

const DIARY_COLS: &str =
    "id, writer_id, text, content, images, date, created_at, is_public, emotion, probs";

/// Which entries a filter query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiaryFilter {
    /// Entries whose date equals the given day.
    Date(NaiveDate),
    /// Entries whose date falls in the given calendar month.
    Month { year: i32, month: u32 },
}

/// Result ordering, selected by the `option` request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiarySort {
    /// Newest first: date descending, then creation time descending.
    #[default]
    Recent,
    /// Oldest first: date ascending, then creation time ascending.
    Old,
    /// Most-liked first, by explicit like count; ties fall back to newest
    /// first.
    MostLiked,
}

impl DiarySort {
    fn order_clause(self) -> &'static str {
        match self {
            DiarySort::Recent => "ORDER BY date DESC, created_at DESC",
            DiarySort::Old => "ORDER BY date ASC, created_at ASC",
            DiarySort::MostLiked => {
                "ORDER BY (SELECT COUNT(*) FROM diary_likes l WHERE l.diary_id = diaries.id) DESC, \
                 date DESC, created_at DESC"
            }
        }
    }
}

/// Fields of a new entry.  The id and creation timestamp are generated on
/// insert.
#[derive(Debug, Clone)]
pub struct NewDiary {
    pub writer_id: i64,
    pub text: String,
    pub content: String,
    pub images: Vec<String>,
    pub date: NaiveDate,
    pub is_public: bool,
    /// `None` when the body was empty after whitespace stripping.
    pub annotation: Option<Annotation>,
}

impl Diary {
    /// The visibility rule: public, or the viewer is the author.
    pub fn visible_to(&self, viewer_id: i64) -> bool {
        self.is_public || self.writer_id == viewer_id
    }
}

impl Database {
    pub fn insert_diary(&self, new: NewDiary) -> Result<Diary> {
        let diary = Diary {
            id: Uuid::new_v4(),
            writer_id: new.writer_id,
            text: new.text,
            content: new.content,
            images: new.images,
            date: new.date,
            created_at: Utc::now(),
            is_public: new.is_public,
            emotion: new.annotation.as_ref().map(|a| a.emotion),
            probs: new.annotation.map(|a| a.probs).unwrap_or_default(),
        };

        self.conn().execute(
            "INSERT INTO diaries (id, writer_id, text, content, images, date, created_at, is_public, emotion, probs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                diary.id.to_string(),
                diary.writer_id,
                diary.text,
                diary.content,
                serde_json::to_string(&diary.images)?,
                diary.date.to_string(),
                diary.created_at.to_rfc3339(),
                diary.is_public,
                diary.emotion.map(u8::from),
                serde_json::to_string(&diary.probs)?,
            ],
        )?;

        Ok(diary)
    }

    pub fn get_diary(&self, id: Uuid) -> Result<Diary> {
        self.conn()
            .query_row(
                &format!("SELECT {DIARY_COLS} FROM diaries WHERE id = ?1"),
                params![id.to_string()],
                row_to_diary,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Persist mutations to an existing entry, including its annotation.
    pub fn update_diary(&self, diary: &Diary) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE diaries
             SET text = ?1, content = ?2, images = ?3, date = ?4, is_public = ?5,
                 emotion = ?6, probs = ?7
             WHERE id = ?8",
            params![
                diary.text,
                diary.content,
                serde_json::to_string(&diary.images)?,
                diary.date.to_string(),
                diary.is_public,
                diary.emotion.map(u8::from),
                serde_json::to_string(&diary.probs)?,
                diary.id.to_string(),
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove an entry.  Comments and likes cascade; image objects are the
    /// caller's cleanup responsibility.
    pub fn delete_diary(&self, id: Uuid) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM diaries WHERE id = ?1", params![id.to_string()])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// The visibility & query engine: every entry the viewer may see that
    /// matches the filter, in the requested order.  No pagination.
    pub fn filter_diaries(
        &self,
        viewer_id: i64,
        filter: DiaryFilter,
        sort: DiarySort,
    ) -> Result<Vec<Diary>> {
        let order = sort.order_clause();

        let mut diaries = Vec::new();
        match filter {
            DiaryFilter::Date(date) => {
                let sql = format!(
                    "SELECT {DIARY_COLS} FROM diaries
                     WHERE (is_public = 1 OR writer_id = ?1) AND date = ?2
                     {order}"
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt.query_map(params![viewer_id, date.to_string()], row_to_diary)?;
                for row in rows {
                    diaries.push(row?);
                }
            }
            DiaryFilter::Month { year, month } => {
                let (start, end) = month_bounds(year, month)?;
                let sql = format!(
                    "SELECT {DIARY_COLS} FROM diaries
                     WHERE (is_public = 1 OR writer_id = ?1)
                       AND date >= ?2 AND date < ?3
                     {order}"
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt.query_map(
                    params![viewer_id, start.to_string(), end.to_string()],
                    row_to_diary,
                )?;
                for row in rows {
                    diaries.push(row?);
                }
            }
        }

        Ok(diaries)
    }

    /// Every entry of one author the viewer may see, newest first.  The
    /// author sees all their entries; everyone else only the public ones.
    pub fn diaries_by_user(&self, viewer_id: i64, writer_id: i64) -> Result<Vec<Diary>> {
        let sql = format!(
            "SELECT {DIARY_COLS} FROM diaries
             WHERE writer_id = ?1 AND (is_public = 1 OR writer_id = ?2)
             ORDER BY date DESC, created_at DESC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![writer_id, viewer_id], row_to_diary)?;

        let mut diaries = Vec::new();
        for row in rows {
            diaries.push(row?);
        }
        Ok(diaries)
    }

    /// Toggle the viewer's membership in an entry's like-set.
    ///
    /// Returns `true` when the viewer is now a member.  Runs as a single
    /// transaction guarded by the (diary, user) primary key, so two
    /// concurrent toggles cannot both observe "not a member".
    pub fn toggle_diary_like(&mut self, diary_id: Uuid, user_id: i64) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO diary_likes (diary_id, user_id) VALUES (?1, ?2)",
            params![diary_id.to_string(), user_id],
        )?;

        let liked = if inserted == 1 {
            true
        } else {
            tx.execute(
                "DELETE FROM diary_likes WHERE diary_id = ?1 AND user_id = ?2",
                params![diary_id.to_string(), user_id],
            )?;
            false
        };

        tx.commit()?;
        Ok(liked)
    }

    /// Usernames of everyone in the entry's like-set.
    pub fn diary_likers(&self, diary_id: Uuid) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.username FROM diary_likes l JOIN users u ON u.id = l.user_id
             WHERE l.diary_id = ?1 ORDER BY u.username",
        )?;
        let rows = stmt.query_map(params![diary_id.to_string()], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    pub fn diary_like_count(&self, diary_id: Uuid) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM diary_likes WHERE diary_id = ?1",
            params![diary_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// First day of the month and first day of the next month, as an exclusive
/// range over date strings.
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or(StoreError::InvalidDate)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(StoreError::InvalidDate)?;
    Ok((start, end))
}

fn row_to_diary(row: &rusqlite::Row<'_>) -> rusqlite::Result<Diary> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let images_json: String = row.get(4)?;
    let images: Vec<String> = serde_json::from_str(&images_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let date_str: String = row.get(5)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let ts_str: String = row.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let emotion_idx: Option<u8> = row.get(8)?;
    let emotion = match emotion_idx {
        Some(idx) => Some(Emotion::try_from(idx).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Integer,
                Box::new(e),
            )
        })?),
        None => None,
    };

    let probs_json: String = row.get(9)?;
    let probs: Vec<EmotionScore> = serde_json::from_str(&probs_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Diary {
        id,
        writer_id: row.get(1)?,
        text: row.get(2)?,
        content: row.get(3)?,
        images,
        date,
        created_at,
        is_public: row.get(7)?,
        emotion,
        probs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use haru_sentiment::Annotator;

    fn test_db() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "Alice", "", "h").unwrap();
        let bob = db.create_user("bob", "Bob", "", "h").unwrap();
        (db, alice.id, bob.id)
    }

    fn entry(writer_id: i64, date: &str, is_public: bool) -> NewDiary {
        NewDiary {
            writer_id,
            text: "some day".to_string(),
            content: String::new(),
            images: Vec::new(),
            date: date.parse().unwrap(),
            is_public,
            annotation: None,
        }
    }

    #[test]
    fn insert_and_fetch_round_trip() {
        let (db, alice, _) = test_db();

        let annotation = match Annotator::fixed_neutral() {
            Annotator::Fixed(a) => a,
            _ => unreachable!(),
        };
        let mut new = entry(alice, "2024-01-01", true);
        new.images = vec!["diary_images/a.png".to_string()];
        new.annotation = Some(annotation.clone());

        let diary = db.insert_diary(new).unwrap();
        let loaded = db.get_diary(diary.id).unwrap();

        assert_eq!(loaded, diary);
        assert_eq!(loaded.emotion, Some(annotation.emotion));
        assert_eq!(loaded.probs, annotation.probs);
    }

    #[test]
    fn empty_text_entry_has_no_annotation() {
        let (db, alice, _) = test_db();
        let diary = db.insert_diary(entry(alice, "2024-01-01", true)).unwrap();

        let loaded = db.get_diary(diary.id).unwrap();
        assert_eq!(loaded.emotion, None);
        assert!(loaded.probs.is_empty());
    }

    #[test]
    fn visibility_rule() {
        let (db, alice, bob) = test_db();
        let private = db.insert_diary(entry(bob, "2024-01-01", false)).unwrap();
        let public = db.insert_diary(entry(bob, "2024-01-01", true)).unwrap();

        assert!(!private.visible_to(alice));
        assert!(private.visible_to(bob));
        assert!(public.visible_to(alice));
    }

    #[test]
    fn date_filter_respects_visibility() {
        let (db, alice, bob) = test_db();
        let date: NaiveDate = "2024-01-01".parse().unwrap();

        let diary = db.insert_diary(entry(bob, "2024-01-01", false)).unwrap();
        db.insert_diary(entry(bob, "2024-01-02", true)).unwrap();

        // Alice sees nothing: the only entry on that date is private.
        let seen = db
            .filter_diaries(alice, DiaryFilter::Date(date), DiarySort::Recent)
            .unwrap();
        assert!(seen.is_empty());

        // Bob sees his own private entry.
        let own = db
            .filter_diaries(bob, DiaryFilter::Date(date), DiarySort::Recent)
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, diary.id);

        // After bob makes it public, alice sees it too.
        let mut diary = diary;
        diary.is_public = true;
        db.update_diary(&diary).unwrap();

        let seen = db
            .filter_diaries(alice, DiaryFilter::Date(date), DiarySort::Recent)
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, diary.id);
    }

    #[test]
    fn month_filter_ordering() {
        let (db, alice, _) = test_db();

        let d1 = db.insert_diary(entry(alice, "2024-03-05", true)).unwrap();
        let d2 = db.insert_diary(entry(alice, "2024-03-20", true)).unwrap();
        let d3 = db.insert_diary(entry(alice, "2024-03-11", true)).unwrap();
        // Outside the month.
        db.insert_diary(entry(alice, "2024-04-01", true)).unwrap();

        let filter = DiaryFilter::Month {
            year: 2024,
            month: 3,
        };

        let recent = db.filter_diaries(alice, filter, DiarySort::Recent).unwrap();
        let ids: Vec<Uuid> = recent.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![d2.id, d3.id, d1.id]);

        let old = db.filter_diaries(alice, filter, DiarySort::Old).unwrap();
        let ids: Vec<Uuid> = old.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![d1.id, d3.id, d2.id]);
    }

    #[test]
    fn most_liked_ordering_uses_counts() {
        let (mut db, alice, bob) = test_db();
        let carol = db.create_user("carol", "Carol", "", "h").unwrap();

        let d1 = db.insert_diary(entry(alice, "2024-03-05", true)).unwrap();
        let d2 = db.insert_diary(entry(alice, "2024-03-06", true)).unwrap();

        // d1 gets two likes, d2 one.
        db.toggle_diary_like(d1.id, bob).unwrap();
        db.toggle_diary_like(d1.id, carol.id).unwrap();
        db.toggle_diary_like(d2.id, bob).unwrap();

        let filter = DiaryFilter::Month {
            year: 2024,
            month: 3,
        };
        let result = db
            .filter_diaries(alice, filter, DiarySort::MostLiked)
            .unwrap();
        let ids: Vec<Uuid> = result.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![d1.id, d2.id]);
    }

    #[test]
    fn like_toggle_is_an_involution() {
        let (mut db, alice, bob) = test_db();
        let diary = db.insert_diary(entry(alice, "2024-01-01", true)).unwrap();

        assert!(db.toggle_diary_like(diary.id, bob).unwrap());
        assert_eq!(db.diary_like_count(diary.id).unwrap(), 1);
        assert_eq!(db.diary_likers(diary.id).unwrap(), vec!["bob"]);

        assert!(!db.toggle_diary_like(diary.id, bob).unwrap());
        assert_eq!(db.diary_like_count(diary.id).unwrap(), 0);

        assert!(db.toggle_diary_like(diary.id, bob).unwrap());
        assert_eq!(db.diary_like_count(diary.id).unwrap(), 1);
    }

    #[test]
    fn diaries_by_user_hides_private_from_others() {
        let (db, alice, bob) = test_db();
        db.insert_diary(entry(bob, "2024-01-01", false)).unwrap();
        db.insert_diary(entry(bob, "2024-01-02", true)).unwrap();

        assert_eq!(db.diaries_by_user(alice, bob).unwrap().len(), 1);
        assert_eq!(db.diaries_by_user(bob, bob).unwrap().len(), 2);
    }

    #[test]
    fn delete_cascades_to_likes() {
        let (mut db, alice, bob) = test_db();
        let diary = db.insert_diary(entry(alice, "2024-01-01", true)).unwrap();
        db.toggle_diary_like(diary.id, bob).unwrap();

        db.delete_diary(diary.id).unwrap();
        assert!(matches!(
            db.get_diary(diary.id).unwrap_err(),
            StoreError::NotFound
        ));
        assert_eq!(db.diary_like_count(diary.id).unwrap(), 0);
    }

    #[test]
    fn invalid_month_is_rejected() {
        let (db, alice, _) = test_db();
        let err = db
            .filter_diaries(
                alice,
                DiaryFilter::Month {
                    year: 2024,
                    month: 13,
                },
                DiarySort::Recent,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDate));
    }
}
