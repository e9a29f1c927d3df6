//! Presence handlers: last-seen write and online/offline read.

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Serialize;

use crate::api::AppState;
use crate::auth::CurrentUser;
use crate::error::ServerError;

pub async fn update_status(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Json<serde_json::Value> {
    state.presence.touch(viewer.id).await;
    Json(serde_json::json!({ "details": "update status" }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
}

pub async fn check_status(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<StatusResponse>, ServerError> {
    {
        let db = state.db.lock().await;
        db.get_user_by_id(user_id)?;
    }

    let presence = state.presence.check(user_id).await;
    Ok(Json(StatusResponse {
        status: presence.online,
        last_active: presence.last_active.map(|t| t.to_rfc3339()),
    }))
}
