//! Filesystem object store for uploaded images.
//!
//! Images arrive as base64 data URLs, get a generated key of the form
//! `<subdir>/<uuid>.<ext>`, and are served back by key.  Deletion on
//! cleanup paths (replaced avatar, removed diary) is best-effort: failures
//! are logged, never propagated, and the sentinel avatar is never deleted.

use std::path::{Path, PathBuf};

use base64::Engine;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use haru_store::DEFAULT_AVATAR;

use crate::error::ServerError;

/// Subdirectory for avatars.
pub const PROFILE_IMAGES: &str = "profile_images";
/// Subdirectory for diary attachments.
pub const DIARY_IMAGES: &str = "diary_images";

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {} // RootDir, CurDir, Prefix: skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for subdir in [PROFILE_IMAGES, DIARY_IMAGES] {
            fs::create_dir_all(base_path.join(subdir)).await.map_err(|e| {
                ServerError::Media(format!(
                    "Failed to create media directory '{}': {}",
                    base_path.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Store raw image bytes under `subdir`, returning the generated key.
    pub async fn store(
        &self,
        subdir: &str,
        data: &[u8],
        ext: &str,
    ) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty image".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::BadRequest(format!(
                "Image too large: {} bytes (max {})",
                data.len(),
                self.max_size
            )));
        }

        let key = format!("{}/{}.{}", subdir, Uuid::new_v4(), ext);
        let path = self.safe_path(&key)?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::Media(format!("Failed to write {}: {}", key, e)))?;

        debug!(key = %key, size = data.len(), "Stored image");
        Ok(key)
    }

    /// Decode a `data:image/<ext>;base64,...` payload and store it.
    pub async fn store_data_url(
        &self,
        subdir: &str,
        data_url: &str,
    ) -> Result<String, ServerError> {
        let (ext, data) = decode_data_url(data_url)?;
        self.store(subdir, &data, &ext).await
    }

    pub async fn load(&self, key: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(key)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("No media object: {key}")));
        }

        fs::read(&path)
            .await
            .map_err(|e| ServerError::Media(format!("Failed to read {}: {}", key, e)))
    }

    pub async fn delete(&self, key: &str) -> Result<(), ServerError> {
        let path = self.safe_path(key)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("No media object: {key}")));
        }

        fs::remove_file(&path)
            .await
            .map_err(|e| ServerError::Media(format!("Failed to delete {}: {}", key, e)))?;

        debug!(key = %key, "Deleted image");
        Ok(())
    }

    /// Best-effort cleanup of a replaced or orphaned object.  The sentinel
    /// avatar is shared by all fresh accounts and is left alone.
    pub async fn delete_best_effort(&self, key: &str) {
        if key == DEFAULT_AVATAR {
            return;
        }
        if let Err(e) = self.delete(key).await {
            warn!(key = %key, error = %e, "Failed to delete media object");
        }
    }

    /// Key -> filesystem path, validated against traversal.  Keys are always
    /// `subdir/filename` pairs generated by this store.
    fn safe_path(&self, key: &str) -> Result<PathBuf, ServerError> {
        if key.contains("..") || key.contains('\\') || key.starts_with('/') {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        let target = self.base_path.join(key);
        ensure_within(&self.base_path, &target)
    }
}

/// Split a data URL into (extension, decoded bytes).
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), ServerError> {
    let rest = data_url
        .strip_prefix("data:image/")
        .ok_or_else(|| ServerError::BadRequest("Expected a data:image/ URL".to_string()))?;

    let (ext, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ServerError::BadRequest("Expected a base64 data URL".to_string()))?;

    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServerError::BadRequest(format!(
            "Invalid image format: {ext}"
        )));
    }

    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ServerError::BadRequest(format!("Invalid base64 image: {e}")))?;

    Ok((ext.to_string(), data))
}

/// MIME type for a stored key, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let (store, _dir) = test_store().await;
        let data = b"\x89PNG fake image bytes";

        let key = store.store(DIARY_IMAGES, data, "png").await.unwrap();
        assert!(key.starts_with("diary_images/"));
        assert!(key.ends_with(".png"));

        let loaded = store.load(&key).await.unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = test_store().await;
        let key = store.store(PROFILE_IMAGES, b"delete-me", "jpg").await.unwrap();

        store.delete(&key).await.unwrap();
        assert!(store.load(&key).await.is_err());
    }

    #[tokio::test]
    async fn test_not_found() {
        let (store, _dir) = test_store().await;
        assert!(store.load("diary_images/missing.png").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.store(DIARY_IMAGES, b"", "png").await.is_err());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.load("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_sentinel_never_deleted() {
        let (store, dir) = test_store().await;
        let sentinel_path = dir.path().join(DEFAULT_AVATAR);
        tokio::fs::write(&sentinel_path, b"default avatar").await.unwrap();

        store.delete_best_effort(DEFAULT_AVATAR).await;
        assert!(sentinel_path.exists());
    }

    #[tokio::test]
    async fn test_store_data_url() {
        let (store, _dir) = test_store().await;
        let payload = base64::engine::general_purpose::STANDARD.encode(b"pixels");
        let url = format!("data:image/png;base64,{payload}");

        let key = store.store_data_url(DIARY_IMAGES, &url).await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), b"pixels");
    }

    #[test]
    fn test_decode_data_url_rejects_garbage() {
        assert!(decode_data_url("not a url").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
        assert!(decode_data_url("data:text/plain;base64,aGk=").is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("diary_images/a.png"), "image/png");
        assert_eq!(content_type_for("profile_images/b.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("weird"), "application/octet-stream");
    }
}
