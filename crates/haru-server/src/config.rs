//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit SQLite database path.  When unset the store picks the
    /// platform data directory.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Filesystem path where uploaded images are stored.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// URL of the sentiment annotation service.
    /// Env: `SENTIMENT_URL`
    /// Default: `http://127.0.0.1:8500/annotate`
    pub sentiment_url: String,

    /// Session lifetime in seconds.
    /// Env: `SESSION_TTL_SECS`
    /// Default: 7 days.
    pub session_ttl_secs: u64,

    /// Maximum decoded image size in bytes (10 MiB).
    pub max_image_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            media_storage_path: PathBuf::from("./media"),
            sentiment_url: "http://127.0.0.1:8500/annotate".to_string(),
            session_ttl_secs: 7 * 24 * 60 * 60,
            max_image_size: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("SENTIMENT_URL") {
            config.sentiment_url = url;
        }

        if let Ok(val) = std::env::var("SESSION_TTL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.session_ttl_secs = secs;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.media_storage_path, PathBuf::from("./media"));
        assert!(config.database_path.is_none());
    }
}
