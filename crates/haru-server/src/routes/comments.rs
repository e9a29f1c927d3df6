//! Comment handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use haru_store::{Comment, Database};

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::routes::diaries::visible_diary;

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub diary: Uuid,
    pub writer: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub likes: Vec<String>,
}

pub(crate) fn comment_response(
    db: &Database,
    comment: &Comment,
) -> Result<CommentResponse, ServerError> {
    let writer = db.get_user_by_id(comment.writer_id)?;
    let likes = db.comment_likers(comment.id)?;

    Ok(CommentResponse {
        id: comment.id,
        diary: comment.diary_id,
        writer: writer.username,
        comment: comment.body.clone(),
        created_at: comment.created_at,
        like_count: likes.len() as i64,
        likes,
    })
}

#[derive(Deserialize)]
pub struct CommentCreateRequest {
    diary: Uuid,
    comment: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Json(req): Json<CommentCreateRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ServerError> {
    if req.comment.trim().is_empty() {
        return Err(ServerError::BadRequest("Comment cannot be empty".to_string()));
    }

    let db = state.db.lock().await;
    // Commenting requires the entry to be visible to the commenter.
    visible_diary(&db, req.diary, viewer.id)?;

    let comment = db.insert_comment(req.diary, viewer.id, &req.comment)?;
    let response = comment_response(&db, &comment)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// All comments on a diary entry, newest first.  The `:id` here is the
/// parent diary id.
pub async fn list_for_diary(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(diary_id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, ServerError> {
    let db = state.db.lock().await;
    visible_diary(&db, diary_id, viewer.id)?;

    let comments = db.comments_for_diary(diary_id)?;
    let mut responses = Vec::with_capacity(comments.len());
    for comment in &comments {
        responses.push(comment_response(&db, comment)?);
    }
    Ok(Json(responses))
}

#[derive(Deserialize)]
pub struct CommentUpdateRequest {
    comment: String,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<CommentUpdateRequest>,
) -> Result<Json<CommentResponse>, ServerError> {
    if req.comment.trim().is_empty() {
        return Err(ServerError::BadRequest("Comment cannot be empty".to_string()));
    }

    let db = state.db.lock().await;
    let comment = db.get_comment(id)?;
    if comment.writer_id != viewer.id {
        return Err(ServerError::Forbidden(
            "Only the author can edit a comment".to_string(),
        ));
    }

    db.update_comment(id, &req.comment)?;
    let updated = db.get_comment(id)?;
    Ok(Json(comment_response(&db, &updated)?))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let db = state.db.lock().await;
    let comment = db.get_comment(id)?;
    if comment.writer_id != viewer.id {
        return Err(ServerError::Forbidden(
            "Only the author can delete a comment".to_string(),
        ));
    }

    db.delete_comment(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn like(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<bool>, ServerError> {
    let mut db = state.db.lock().await;
    let comment = db.get_comment(id)?;
    visible_diary(&db, comment.diary_id, viewer.id)?;

    let liked = db.toggle_comment_like(id, viewer.id)?;
    Ok(Json(liked))
}
