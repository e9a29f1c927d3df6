//! # haru-server
//!
//! REST backend for the haru social diary.
//!
//! This binary provides:
//! - **Account and session handling** (argon2id password hashes, bearer
//!   tokens)
//! - **Diary CRUD** with the visibility & query engine and per-entry
//!   sentiment annotation via the external classification service
//! - **Social graph** (follow edges) and like toggles on diaries and
//!   comments
//! - **Image storage** for avatars and diary attachments
//! - **Presence tracking** (last-seen timestamps with a 60 s online window)

mod api;
mod auth;
mod config;
mod error;
mod media_store;
mod presence;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use haru_sentiment::{Annotator, RemoteAnnotator};
use haru_store::Database;

use crate::api::AppState;
use crate::auth::SessionStore;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;
use crate::presence::PresenceTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,haru_server=debug")),
        )
        .init();

    info!("Starting haru server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Relational store (runs migrations on open)
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    // Media store (creates directories if missing)
    let media = Arc::new(
        MediaStore::new(config.media_storage_path.clone(), config.max_image_size).await?,
    );

    // Sentiment annotator: a service object handed to the write path, not a
    // hidden module-level global.
    let annotator = Arc::new(Annotator::Remote(RemoteAnnotator::new(
        config.sentiment_url.clone(),
    )));

    let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_secs));
    let presence = PresenceTracker::new();

    let app_state = AppState {
        db: Arc::new(tokio::sync::Mutex::new(db)),
        media,
        annotator,
        sessions: sessions.clone(),
        presence: presence.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic session cleanup (every 10 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // Periodic presence cleanup (every 5 minutes, evict entries idle >1 h)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            presence.purge_stale(3600).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
