//! File storage
//!
//! Stored files are addressed by a storage key (`folder/name.ext`). The
//! editor keeps keys in its rows and asks the storage for public URLs.
//! Deletions happen after the owning transaction commits, through
//! [`delete_quietly`], so a failing backend never blocks a publish.

mod local;

pub use local::LocalFileStorage;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Metadata of a freshly stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Storage key, relative to the storage root
    pub key: String,
    pub url: String,
    pub size: u64,
    /// Original client file name
    pub name: String,
    pub extension: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Short name recorded on attachment rows
    fn engine(&self) -> &'static str;

    /// Store `data` under `folder` with a generated file name
    async fn store(
        &self,
        folder: &str,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile>;

    /// Delete a stored file. Deleting a missing file is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    fn url(&self, key: &str) -> String;
}

pub type DynFileStorage = Arc<dyn FileStorage>;

/// Delete files whose rows are gone, logging failures instead of returning them
pub async fn delete_quietly(storage: &dyn FileStorage, keys: &[String]) -> usize {
    let mut deleted = 0;
    for key in keys {
        match storage.delete(key).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to delete stored file"),
        }
    }
    deleted
}

/// Get file extension from filename or content type
pub fn get_extension(filename: &str, content_type: &str) -> String {
    if let Some((_, ext)) = filename.rsplit_once('.') {
        if !ext.is_empty() && ext.len() < 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext.to_lowercase();
        }
    }

    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" => "wav",
        "audio/webm" => "webm",
        "application/pdf" => "pdf",
        _ => "bin",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_extension() {
        assert_eq!(get_extension("Photo.PNG", "image/png"), "png");
        assert_eq!(get_extension("voice", "audio/mpeg"), "mp3");
        assert_eq!(get_extension("archive.tar.gz", "application/gzip"), "gz");
        assert_eq!(get_extension("weird.???", "application/x-unknown"), "bin");
    }

    #[tokio::test]
    async fn test_delete_quietly_counts_successes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), "/media");
        let stored = storage.store("attachments", "a.txt", "text/plain", b"a").await.unwrap();

        let keys = vec![stored.key.clone(), "../outside.txt".to_string()];
        assert_eq!(delete_quietly(&storage, &keys).await, 1);
        assert!(!dir.path().join(&stored.key).exists());
    }
}
