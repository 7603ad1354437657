//! File storage backends.
//!
//! Files are addressed by a flat storage key (the generated filename).

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File storage backend trait.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write data to storage under a new key. Fails if the key is taken.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read data stored under the given key.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete a file from storage. Deleting a missing file is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Local filesystem storage.
pub struct LocalFileStorage {
    /// Directory files are written to.
    base_path: PathBuf,
}

impl LocalFileStorage {
    /// Create a new local file storage rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a storage key to a path under the base directory.
    ///
    /// Rejects keys containing `..`, root or prefix components to prevent
    /// directory traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\0') {
            bail!("invalid storage key");
        }
        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                bail!("directory traversal not allowed in storage key");
            }
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        // Keys are unique; an existing file is never overwritten.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to create file for key {key}"))?;

        file.write_all(data).await.context("failed to write file")?;

        file.flush().await.context("failed to flush file")?;

        debug!(key = %key, path = ?path, size = data.len(), "file written");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        let data = fs::read(&path).await.context("failed to read file")?;
        debug!(key = %key, size = data.len(), "file read");
        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .context("failed to delete file")?;
            debug!(key = %key, "file deleted");
        } else {
            warn!(key = %key, "file not found for deletion");
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("base_path", &self.base_path)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        storage.write("abc_test.png", b"png-bytes").await.unwrap();
        assert!(storage.exists("abc_test.png").await.unwrap());
        assert_eq!(storage.read("abc_test.png").await.unwrap(), b"png-bytes");

        storage.delete("abc_test.png").await.unwrap();
        assert!(!storage.exists("abc_test.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        assert!(storage.delete("never_written.png").await.is_ok());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        assert!(storage.write("../escape.png", b"x").await.is_err());
        assert!(storage.read("/etc/passwd").await.is_err());
        assert!(storage.delete("").await.is_err());
    }

    #[tokio::test]
    async fn test_write_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        storage.write("abc_same.png", b"first").await.unwrap();
        assert!(storage.write("abc_same.png", b"second").await.is_err());
        assert_eq!(storage.read("abc_same.png").await.unwrap(), b"first");
    }
}
