//! Social-graph handlers: follow edges, follower/following listings.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use haru_store::{Database, Follow};

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::routes::users::UserSummary;

#[derive(Serialize)]
pub struct FollowResponse {
    pub id: i64,
    pub follower: String,
    pub following: String,
    pub created_at: DateTime<Utc>,
}

fn follow_response(db: &Database, edge: &Follow) -> Result<FollowResponse, ServerError> {
    let follower = db.get_user_by_id(edge.follower_id)?;
    let following = db.get_user_by_id(edge.following_id)?;

    Ok(FollowResponse {
        id: edge.id,
        follower: follower.username,
        following: following.username,
        created_at: edge.created_at,
    })
}

#[derive(Deserialize)]
pub struct FollowCreateRequest {
    /// User id to follow.
    following: i64,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Json(req): Json<FollowCreateRequest>,
) -> Result<(StatusCode, Json<FollowResponse>), ServerError> {
    let db = state.db.lock().await;
    let edge = db.follow(viewer.id, req.following)?;

    info!(
        follower_id = viewer.id,
        following_id = req.following,
        "follow edge created"
    );

    let response = follow_response(&db, &edge)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Every edge the viewer is part of, on either side.
pub async fn list(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Result<Json<Vec<FollowResponse>>, ServerError> {
    let db = state.db.lock().await;
    let edges = db.follow_edges_for(viewer.id)?;

    let mut responses = Vec::with_capacity(edges.len());
    for edge in &edges {
        responses.push(follow_response(&db, edge)?);
    }
    Ok(Json(responses))
}

pub async fn followers(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    let db = state.db.lock().await;
    let users = db.followers(viewer.id)?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

pub async fn following(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    let db = state.db.lock().await;
    let users = db.following(viewer.id)?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

/// Remove the edge viewer -> `:id`.  Unfollowing someone you do not follow
/// is a 404, not a silent success.
pub async fn unfollow(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let db = state.db.lock().await;
    db.unfollow(viewer.id, id)?;

    info!(follower_id = viewer.id, following_id = id, "unfollowed");
    Ok(Json(serde_json::json!({
        "detail": "Successfully unfollowed the user."
    })))
}
