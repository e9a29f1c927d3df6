//! HTTP API: application state, router assembly and the serve loop.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use haru_sentiment::Annotator;
use haru_store::Database;

use crate::auth::{require_auth, SessionStore};
use crate::config::ServerConfig;
use crate::media_store::MediaStore;
use crate::presence::PresenceTracker;
use crate::routes;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub media: Arc<MediaStore>,
    pub annotator: Arc<Annotator>,
    pub sessions: SessionStore,
    pub presence: PresenceTracker,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/signup/", post(routes::users::signup))
        .route("/login/", post(routes::users::login));

    let protected = Router::new()
        // User
        .route("/logout/", get(routes::users::logout))
        .route("/user/", get(routes::users::me))
        .route(
            "/user/check-username/:username/",
            get(routes::users::check_username),
        )
        .route("/user/:username/", get(routes::users::profile))
        .route("/user/update/:id", patch(routes::users::update))
        // Diary
        .route("/diary/", post(routes::diaries::create))
        .route("/diary/filter/", get(routes::diaries::filter))
        .route("/diary/by-user/:id", get(routes::diaries::by_user))
        .route("/diary/like/:id/", post(routes::diaries::like))
        .route(
            "/diary/:id/",
            get(routes::diaries::retrieve)
                .patch(routes::diaries::update)
                .delete(routes::diaries::remove),
        )
        // Comments.  GET interprets :id as the parent diary id; PATCH and
        // DELETE as the comment id.
        .route("/comments/", post(routes::comments::create))
        .route(
            "/comments/:id/",
            get(routes::comments::list_for_diary)
                .patch(routes::comments::update)
                .delete(routes::comments::remove),
        )
        .route("/comments/:id/like/", post(routes::comments::like))
        // Follow
        .route(
            "/follow/",
            post(routes::follows::create).get(routes::follows::list),
        )
        .route("/follow/followers/", get(routes::follows::followers))
        .route("/follow/following/", get(routes::follows::following))
        .route("/follow/:id/unfollow/", delete(routes::follows::unfollow))
        // Presence
        .route("/update-status/", post(routes::status::update_status))
        .route("/check-status/:id/", get(routes::status::check_status))
        // Media
        .route("/media/*key", get(routes::media::download))
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            require_auth,
        ));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
