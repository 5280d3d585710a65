//! Media storage for proof photos, covers and avatars
//!
//! The core only ever keeps the returned URL; where the bytes live is this
//! module's business. The default implementation writes content-addressed
//! files under a directory served by the static file layer.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::{
    config::MediaConfig,
    error::{AppError, AppResult},
};

/// Storage for uploaded files. `store` returns the public URL persisted on
/// the loan/batch/user record.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, filename: &str, bytes: &[u8]) -> AppResult<String>;
}

/// Filesystem-backed store. Files are named by content hash so re-uploads of
/// the same photo dedupe instead of piling up.
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn hashed_name(filename: &str, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        format!("{}.{}", hex::encode(&digest[..16]), ext.to_lowercase())
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, filename: &str, bytes: &[u8]) -> AppResult<String> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let name = Self::hashed_name(filename, bytes);
        let path = self.root.join(&name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Media(format!("Cannot create media dir: {}", e)))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Media(format!("Cannot write {}: {}", name, e)))?;

        Ok(format!("{}/{}", self.public_base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_hashes_to_same_name() {
        let a = LocalMediaStore::hashed_name("bukti.jpg", b"photo-bytes");
        let b = LocalMediaStore::hashed_name("other.JPG", b"photo-bytes");
        assert_eq!(a.split('.').next(), b.split('.').next());
        assert!(a.ends_with(".jpg"));
        assert!(b.ends_with(".jpg"));
    }

    #[test]
    fn different_content_hashes_differently() {
        let a = LocalMediaStore::hashed_name("bukti.jpg", b"one");
        let b = LocalMediaStore::hashed_name("bukti.jpg", b"two");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn store_writes_and_returns_public_url() {
        let dir = std::env::temp_dir().join(format!("pustaka-media-test-{}", std::process::id()));
        let store = LocalMediaStore {
            root: dir.clone(),
            public_base_url: "/media".to_string(),
        };

        let url = store.store("bukti.jpg", b"photo-bytes").await.unwrap();
        assert!(url.starts_with("/media/"));

        let name = url.rsplit('/').next().unwrap();
        let on_disk = tokio::fs::read(dir.join(name)).await.unwrap();
        assert_eq!(on_disk, b"photo-bytes");

        tokio::fs::remove_dir_all(dir).await.ok();
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let store = LocalMediaStore {
            root: std::env::temp_dir(),
            public_base_url: "/media".to_string(),
        };
        assert!(store.store("bukti.jpg", b"").await.is_err());
    }
}
