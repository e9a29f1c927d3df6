//! Diary handlers: the write path (with sentiment annotation and image
//! upload), the filter query endpoint, and the like toggle.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use haru_sentiment::{Annotation, Annotator, Emotion, EmotionScore};
use haru_store::{Database, Diary, DiaryFilter, DiarySort, NewDiary};

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::media_store::{MediaStore, DIARY_IMAGES};
use crate::routes::comments::{comment_response, CommentResponse};

#[derive(Serialize)]
pub struct DiaryResponse {
    pub id: Uuid,
    pub writer: String,
    pub text: String,
    pub content: String,
    /// Media storage keys; fetch via `/media/{key}`.
    pub images: Vec<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
    pub emotion: Option<Emotion>,
    pub probs: Vec<EmotionScore>,
    pub like_count: i64,
    pub likes: Vec<String>,
    pub comments: Vec<CommentResponse>,
}

pub(crate) fn diary_response(db: &Database, diary: &Diary) -> Result<DiaryResponse, ServerError> {
    let writer = db.get_user_by_id(diary.writer_id)?;
    let likes = db.diary_likers(diary.id)?;

    let mut comments = Vec::new();
    for comment in db.comments_for_diary(diary.id)? {
        comments.push(comment_response(db, &comment)?);
    }

    Ok(DiaryResponse {
        id: diary.id,
        writer: writer.username,
        text: diary.text.clone(),
        content: diary.content.clone(),
        images: diary.images.clone(),
        date: diary.date,
        created_at: diary.created_at,
        is_public: diary.is_public,
        emotion: diary.emotion,
        probs: diary.probs.clone(),
        like_count: likes.len() as i64,
        likes,
        comments,
    })
}

/// Annotate the body, unless it is empty after whitespace stripping.
/// Annotation failures are an enrichment loss, not an error: log and move on.
async fn annotate(annotator: &Annotator, text: &str) -> Option<Annotation> {
    if !text.chars().any(|c| !c.is_whitespace()) {
        return None;
    }
    match annotator.annotate(text).await {
        Ok(annotation) => Some(annotation),
        Err(e) => {
            warn!(error = %e, "sentiment annotation failed");
            None
        }
    }
}

async fn store_images(
    media: &MediaStore,
    data_urls: &[String],
) -> Result<Vec<String>, ServerError> {
    let mut keys = Vec::with_capacity(data_urls.len());
    for url in data_urls {
        keys.push(media.store_data_url(DIARY_IMAGES, url).await?);
    }
    Ok(keys)
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct DiaryCreateRequest {
    text: String,
    #[serde(default)]
    content: String,
    /// Base64 data URLs.
    #[serde(default)]
    images: Vec<String>,
    /// `YYYY-MM-DD`.
    date: String,
    #[serde(default = "default_true")]
    is_public: bool,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Json(req): Json<DiaryCreateRequest>,
) -> Result<(StatusCode, Json<DiaryResponse>), ServerError> {
    let date = parse_date(&req.date)?;

    let images = store_images(&state.media, &req.images).await?;

    // Synchronous on the write path: entry latency includes the model call.
    let annotation = annotate(&state.annotator, &req.text).await;

    let db = state.db.lock().await;
    let diary = db.insert_diary(NewDiary {
        writer_id: viewer.id,
        text: req.text,
        content: req.content,
        images,
        date,
        is_public: req.is_public,
        annotation,
    })?;

    info!(diary_id = %diary.id, writer_id = viewer.id, "diary created");

    let response = diary_response(&db, &diary)?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub async fn retrieve(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DiaryResponse>, ServerError> {
    let db = state.db.lock().await;
    let diary = visible_diary(&db, id, viewer.id)?;
    Ok(Json(diary_response(&db, &diary)?))
}

#[derive(Deserialize)]
pub struct FilterParams {
    date: Option<String>,
    month: Option<String>,
    option: Option<String>,
}

pub async fn filter(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<DiaryResponse>>, ServerError> {
    let filter = match (&params.date, &params.month) {
        (Some(date), _) => DiaryFilter::Date(parse_date(date)?),
        (None, Some(month)) => parse_month(month)?,
        (None, None) => {
            return Err(ServerError::BadRequest(
                "Either 'date' or 'month' is required".to_string(),
            ))
        }
    };
    let sort = parse_sort(params.option.as_deref())?;

    let db = state.db.lock().await;
    let diaries = db.filter_diaries(viewer.id, filter, sort)?;

    let mut responses = Vec::with_capacity(diaries.len());
    for diary in &diaries {
        responses.push(diary_response(&db, diary)?);
    }
    Ok(Json(responses))
}

pub async fn by_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(writer_id): Path<i64>,
) -> Result<Json<Vec<DiaryResponse>>, ServerError> {
    let db = state.db.lock().await;
    // 404 for unknown authors rather than an empty list.
    db.get_user_by_id(writer_id)?;

    let diaries = db.diaries_by_user(viewer.id, writer_id)?;
    let mut responses = Vec::with_capacity(diaries.len());
    for diary in &diaries {
        responses.push(diary_response(&db, diary)?);
    }
    Ok(Json(responses))
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct DiaryUpdateRequest {
    text: Option<String>,
    content: Option<String>,
    /// Base64 data URLs; when present, replaces the attachment list.
    images: Option<Vec<String>>,
    date: Option<String>,
    is_public: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<DiaryUpdateRequest>,
) -> Result<Json<DiaryResponse>, ServerError> {
    let date = req.date.as_deref().map(parse_date).transpose()?;

    // Reject unknown ids and non-authors before any image object is
    // written, so a failed update leaves no orphans in media storage.
    {
        let db = state.db.lock().await;
        let diary = db.get_diary(id)?;
        if diary.writer_id != viewer.id {
            return Err(ServerError::Forbidden(
                "Only the author can edit a diary".to_string(),
            ));
        }
    }

    let new_images = match &req.images {
        Some(urls) => Some(store_images(&state.media, urls).await?),
        None => None,
    };

    // Re-annotate outside the db lock when the body changed.
    let annotation = match &req.text {
        Some(text) => annotate(&state.annotator, text).await,
        None => None,
    };

    let (response, replaced_images) = {
        let db = state.db.lock().await;
        let mut diary = db.get_diary(id)?;
        if diary.writer_id != viewer.id {
            return Err(ServerError::Forbidden(
                "Only the author can edit a diary".to_string(),
            ));
        }

        if let Some(text) = req.text {
            diary.text = text;
        }
        if let Some(content) = req.content {
            diary.content = content;
        }
        if let Some(date) = date {
            diary.date = date;
        }
        if let Some(is_public) = req.is_public {
            diary.is_public = is_public;
        }

        let replaced = match new_images {
            Some(keys) => Some(std::mem::replace(&mut diary.images, keys)),
            None => None,
        };

        // A body that became empty (or an annotation failure) leaves the
        // prior annotation untouched.
        if let Some(annotation) = annotation {
            diary.emotion = Some(annotation.emotion);
            diary.probs = annotation.probs;
        }

        db.update_diary(&diary)?;
        (diary_response(&db, &diary)?, replaced)
    };

    if let Some(old_keys) = replaced_images {
        for key in old_keys {
            state.media.delete_best_effort(&key).await;
        }
    }

    Ok(Json(response))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let images = {
        let db = state.db.lock().await;
        let diary = db.get_diary(id)?;
        if diary.writer_id != viewer.id {
            return Err(ServerError::Forbidden(
                "Only the author can delete a diary".to_string(),
            ));
        }
        db.delete_diary(id)?;
        diary.images
    };

    // Image objects are not part of the delete transaction; cleanup is
    // best-effort.
    for key in &images {
        state.media.delete_best_effort(key).await;
    }

    info!(diary_id = %id, "diary deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Like toggle
// ---------------------------------------------------------------------------

pub async fn like(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<bool>, ServerError> {
    let mut db = state.db.lock().await;
    visible_diary(&db, id, viewer.id)?;

    let liked = db.toggle_diary_like(id, viewer.id)?;
    Ok(Json(liked))
}

/// Load an entry, reporting 404 (not 403) for private entries of other
/// authors so their existence is not revealed.
pub(crate) fn visible_diary(
    db: &Database,
    id: Uuid,
    viewer_id: i64,
) -> Result<Diary, ServerError> {
    let diary = db.get_diary(id)?;
    if !diary.visible_to(viewer_id) {
        return Err(ServerError::NotFound("Record not found".to_string()));
    }
    Ok(diary)
}

fn parse_date(s: &str) -> Result<NaiveDate, ServerError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ServerError::BadRequest(format!("Invalid date: {s}")))
}

/// `YYYY-MM`.
fn parse_month(s: &str) -> Result<DiaryFilter, ServerError> {
    let invalid = || ServerError::BadRequest(format!("Invalid month: {s}"));

    let (year, month) = s.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    Ok(DiaryFilter::Month { year, month })
}

fn parse_sort(option: Option<&str>) -> Result<DiarySort, ServerError> {
    match option {
        None | Some("") => Ok(DiarySort::Recent),
        Some("old") => Ok(DiarySort::Old),
        Some("like") => Ok(DiarySort::MostLiked),
        Some(other) => Err(ServerError::BadRequest(format!(
            "Unknown sort option: {other}"
        ))),
    }
}
