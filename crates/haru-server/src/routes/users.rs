//! Account handlers: signup, login/logout, profiles.

use axum::{
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use haru_store::{Database, User};

use crate::api::AppState;
use crate::auth::{self, CurrentUser};
use crate::error::ServerError;
use crate::media_store::PROFILE_IMAGES;

/// Full profile payload, including both sides of the social graph as
/// username lists.
#[derive(Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    /// Media storage key of the avatar; fetch via `/media/{key}`.
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub followers: Vec<String>,
    pub followings: Vec<String>,
}

/// Compact user payload for lists (followers, following).
#[derive(Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub image: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

pub(crate) fn user_profile(db: &Database, user: &User) -> Result<UserProfile, ServerError> {
    let followers = db
        .followers(user.id)?
        .into_iter()
        .map(|u| u.username)
        .collect();
    let followings = db
        .following(user.id)?
        .into_iter()
        .map(|u| u.username)
        .collect();

    Ok(UserProfile {
        id: user.id,
        username: user.username.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        image: user.image.clone(),
        created_at: user.created_at,
        followers,
        followings,
    })
}

// ---------------------------------------------------------------------------
// Signup / login
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SignupRequest {
    username: String,
    password: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ServerError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ServerError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&req.password)?;

    let db = state.db.lock().await;
    if db.username_exists(&req.username)? {
        return Err(ServerError::BadRequest(
            "Username already exists".to_string(),
        ));
    }

    let display_name = if req.name.is_empty() {
        req.username.clone()
    } else {
        req.name.clone()
    };
    let user = db.create_user(&req.username, &display_name, &req.email, &password_hash)?;

    info!(user_id = user.id, username = %user.username, "user created");

    let profile = user_profile(&db, &user)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    user_id: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let user = {
        let db = state.db.lock().await;
        db.get_user_by_username(&req.username)
            .map_err(|_| ServerError::BadRequest("Invalid credentials".to_string()))?
    };

    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(ServerError::BadRequest("Invalid credentials".to_string()));
    }

    let token = state.sessions.create(user.id).await;
    info!(user_id = user.id, "login success");

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    if let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.sessions.revoke(token).await;
    }
    Json(serde_json::json!({ "details": "Successfully logged out." }))
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

pub async fn me(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
) -> Result<Json<UserProfile>, ServerError> {
    let db = state.db.lock().await;
    let user = db.get_user_by_id(viewer.id)?;
    Ok(Json(user_profile(&db, &user)?))
}

#[derive(Serialize)]
pub struct PublicProfileResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Whether the requesting viewer already follows this user.
    pub following: bool,
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Json<PublicProfileResponse>, ServerError> {
    let db = state.db.lock().await;
    let user = db.get_user_by_username(&username)?;
    let following = db.is_following(viewer.id, user.id)?;

    Ok(Json(PublicProfileResponse {
        profile: user_profile(&db, &user)?,
        following,
    }))
}

/// Returns whether the username is already taken.
pub async fn check_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<bool>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.username_exists(&username)?))
}

#[derive(Deserialize)]
pub struct UserUpdateRequest {
    username: Option<String>,
    name: Option<String>,
    email: Option<String>,
    /// New avatar as a base64 data URL.
    image: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(viewer): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UserUpdateRequest>,
) -> Result<Json<UserProfile>, ServerError> {
    if viewer.id != id {
        return Err(ServerError::Forbidden(
            "Cannot update another user's profile".to_string(),
        ));
    }

    // Store the new avatar before touching the row so a failed upload leaves
    // the profile unchanged.
    let new_avatar = match &req.image {
        Some(data_url) => Some(state.media.store_data_url(PROFILE_IMAGES, data_url).await?),
        None => None,
    };

    let (profile, old_avatar) = {
        let db = state.db.lock().await;
        let mut user = db.get_user_by_id(id)?;

        if let Some(username) = req.username {
            user.username = username;
        }
        if let Some(name) = req.name {
            user.name = name;
        }
        if let Some(email) = req.email {
            user.email = email;
        }

        let old_avatar = match new_avatar {
            Some(key) => {
                let old = std::mem::replace(&mut user.image, key);
                Some(old)
            }
            None => None,
        };

        db.update_user(&user)?;
        let profile = user_profile(&db, &user)?;
        (profile, old_avatar)
    };

    // Replaced avatar cleanup is best-effort; the sentinel is never removed.
    if let Some(old) = old_avatar {
        state.media.delete_best_effort(&old).await;
    }

    Ok(Json(profile))
}
