//! Local filesystem storage

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::{get_extension, FileStorage, StoredFile};
use crate::config::StorageConfig;

/// Files under a root directory, served from `public_url`
pub struct LocalFileStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.path.clone(), config.public_url.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, refusing anything that leaves the root
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            bail!("Invalid storage key: {}", key);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    fn engine(&self) -> &'static str {
        "local"
    }

    async fn store(
        &self,
        folder: &str,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        let extension = get_extension(original_name, content_type);
        let key = format!(
            "{}/{}.{}",
            folder.trim_matches('/'),
            Uuid::new_v4(),
            extension
        );
        let path = self.resolve(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create storage dir: {:?}", parent))?;
        }
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to save file: {:?}", path))?;

        Ok(StoredFile {
            url: self.url(&key),
            key,
            size: data.len() as u64,
            name: original_name.to_string(),
            extension,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete file: {:?}", path)),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), "/media/");

        let stored = storage
            .store("matching", "Cat.JPG", "image/jpeg", b"jpeg bytes")
            .await
            .unwrap();
        assert!(stored.key.starts_with("matching/"));
        assert!(stored.key.ends_with(".jpg"));
        assert_eq!(stored.url, format!("/media/{}", stored.key));
        assert_eq!(stored.size, 10);
        assert_eq!(stored.name, "Cat.JPG");
        assert_eq!(std::fs::read(dir.path().join(&stored.key)).unwrap(), b"jpeg bytes");

        storage.delete(&stored.key).await.unwrap();
        assert!(!dir.path().join(&stored.key).exists());
        // Already gone
        storage.delete(&stored.key).await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().join("media"), "/media");

        assert!(storage.delete("../secret.txt").await.is_err());
        assert!(storage.delete("/etc/passwd").await.is_err());
        assert!(storage.delete("").await.is_err());
        assert!(storage.store("..", "a.png", "image/png", b"x").await.is_err());
    }
}
