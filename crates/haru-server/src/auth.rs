//! Password hashing and session-token authentication.
//!
//! Passwords are hashed with argon2id and stored as PHC strings.  A login
//! mints a random bearer token kept in an in-memory [`SessionStore`] with a
//! TTL; the [`require_auth`] middleware resolves the token to a
//! [`CurrentUser`] extension before any protected handler runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ServerError;

/// Hash a password using argon2id.
///
/// Returns the PHC-formatted hash string that includes the salt and
/// parameters.
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServerError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServerError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ServerError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// The authenticated viewer, inserted as a request extension by
/// [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: i64,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    expires_at: Instant,
}

/// In-memory token -> user map with TTL.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Mint a fresh token for the user.
    pub async fn create(&self, user_id: i64) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: Instant::now() + self.ttl,
            },
        );

        debug!(user_id, "session created");
        token
    }

    /// Resolve a token to a user id, or `None` if unknown or expired.
    pub async fn resolve(&self, token: &str) -> Option<i64> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(session) if session.expires_at > Instant::now() => Some(session.user_id),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Revoke a token.  Revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token);
    }

    /// Drop expired sessions.  Called periodically from a background task.
    pub async fn purge_expired(&self) {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        sessions.retain(|_, session| session.expires_at > now);
    }
}

fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    let auth = req.headers().get("authorization")?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
}

/// Middleware guarding every protected route: resolves the bearer token and
/// injects [`CurrentUser`], or rejects with 401 before the handler body runs.
pub async fn require_auth(
    State(sessions): State<SessionStore>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ServerError::Unauthorized("Missing bearer token".to_string()))?;

    let user_id = sessions
        .resolve(token)
        .await
        .ok_or_else(|| ServerError::Unauthorized("Invalid or expired session".to_string()))?;

    req.extensions_mut().insert(CurrentUser { id: user_id });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).unwrap();

        // Hash should be in PHC format.
        assert!(hash.starts_with("$argon2"));

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn different_salts() {
        let password = "same-password";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // Same password should produce different hashes (different salts).
        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn invalid_hash_format() {
        assert!(verify_password("password", "not-a-valid-hash").is_err());
    }

    #[tokio::test]
    async fn session_round_trip() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(42).await;

        assert_eq!(store.resolve(&token).await, Some(42));

        store.revoke(&token).await;
        assert_eq!(store.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn expired_session_rejected() {
        let store = SessionStore::new(Duration::from_secs(0));
        let token = store.create(7).await;

        assert_eq!(store.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn purge_drops_expired() {
        let store = SessionStore::new(Duration::from_secs(0));
        store.create(1).await;
        store.create(2).await;

        store.purge_expired().await;

        let sessions = store.sessions.lock().await;
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let store = SessionStore::new(Duration::from_secs(60));
        let t1 = store.create(1).await;
        let t2 = store.create(1).await;
        assert_ne!(t1, t2);
    }
}
