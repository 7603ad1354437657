//! Upload bookkeeping.
//!
//! Validates uploaded images, writes them under generated names and hands
//! back root-relative references (`/uploads/<name>`) that records store.
//! Removal of referenced files is best-effort: failures are logged only.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::storage::FileStorage;
use crate::form::UploadedFile;

/// Default maximum file size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Allowed MIME types for upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Upload validation and storage failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("empty file")]
    Empty,

    #[error("failed to store file")]
    Storage(#[from] anyhow::Error),
}

/// File service for managing uploads.
pub struct FileService {
    storage: Arc<dyn FileStorage>,
    /// Root-relative URL prefix of stored references, without trailing slash.
    base_url: String,
    max_file_size: usize,
}

impl FileService {
    /// Create a new file service.
    pub fn new(
        storage: Arc<dyn FileStorage>,
        base_url: impl Into<String>,
        max_file_size: usize,
    ) -> Self {
        Self {
            storage,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_file_size,
        }
    }

    /// Root-relative URL prefix uploads are served under.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Maximum accepted size of one file in bytes.
    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Check size and content type, returning the effective MIME type.
    ///
    /// The type sniffed from the content wins over the client's claim.
    pub fn validate(&self, upload: &UploadedFile) -> Result<String, UploadError> {
        if upload.data.is_empty() {
            return Err(UploadError::Empty);
        }
        if upload.data.len() > self.max_file_size {
            return Err(UploadError::TooLarge {
                size: upload.data.len(),
                max: self.max_file_size,
            });
        }

        let mime_type = infer::get(&upload.data)
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| upload.content_type.clone())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(UploadError::UnsupportedType(mime_type));
        }

        Ok(mime_type)
    }

    /// Validate and store one upload, returning its reference.
    pub async fn store(&self, upload: &UploadedFile) -> Result<String, UploadError> {
        self.validate(upload)?;
        self.write(upload).await
    }

    /// Validate and store uploads in order, returning their references.
    ///
    /// Every upload is validated before the first one is written. If a write
    /// fails, the files already written for this batch are removed again.
    pub async fn store_all(&self, uploads: &[UploadedFile]) -> Result<Vec<String>, UploadError> {
        for upload in uploads {
            self.validate(upload)?;
        }

        let mut references = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.write(upload).await {
                Ok(reference) => references.push(reference),
                Err(e) => {
                    self.discard(&references).await;
                    return Err(e);
                }
            }
        }

        Ok(references)
    }

    async fn write(&self, upload: &UploadedFile) -> Result<String, UploadError> {
        let key = generate_key(&upload.file_name);
        self.storage.write(&key, &upload.data).await?;

        let reference = format!("{}/{}", self.base_url, key);
        debug!(
            field = %upload.field,
            filename = %upload.file_name,
            reference = %reference,
            size = upload.data.len(),
            "file uploaded"
        );
        Ok(reference)
    }

    /// Storage key behind a reference, if it is one of ours.
    pub fn key_for<'a>(&self, reference: &'a str) -> Option<&'a str> {
        let key = reference
            .strip_prefix(self.base_url.as_str())?
            .strip_prefix('/')?;

        let valid = !key.is_empty()
            && !key.contains("..")
            && !key.contains(['/', '\\', '\0']);
        valid.then_some(key)
    }

    /// Whether `value` is a reference to a file this service stored.
    pub fn is_reference(&self, value: &str) -> bool {
        self.key_for(value).is_some()
    }

    /// Remove a referenced file. Failures are logged, never returned.
    pub async fn remove_reference(&self, reference: &str) {
        if reference.is_empty() {
            return;
        }
        let Some(key) = self.key_for(reference) else {
            warn!(reference = %reference, "not removing file outside uploads directory");
            return;
        };

        if let Err(e) = self.storage.delete(key).await {
            warn!(error = %e, reference = %reference, "failed to delete file from storage");
        }
    }

    /// Remove every referenced file. Failures are logged, never returned.
    pub async fn discard<S: AsRef<str>>(&self, references: &[S]) {
        for reference in references {
            self.remove_reference(reference.as_ref()).await;
        }
    }

    /// Read the file stored under `key`.
    pub async fn read(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.storage.read(key).await
    }

    /// Whether a referenced file exists in storage.
    pub async fn exists(&self, reference: &str) -> bool {
        match self.key_for(reference) {
            Some(key) => self.storage.exists(key).await.unwrap_or(false),
            None => false,
        }
    }
}

/// Generate a unique storage key for an uploaded file.
pub fn generate_key(filename: &str) -> String {
    let unique_id = Uuid::now_v7().simple().to_string();
    let safe_filename = sanitize_filename(filename);
    // The time-ordered prefix of a v7 UUID collides within a millisecond,
    // so the random tail is used.
    format!("{}_{}", &unique_id[24..], safe_filename)
}

/// Sanitize a filename for safe storage.
pub fn sanitize_filename(filename: &str) -> String {
    use std::path::Path;

    // Get just the filename part (no path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .take(200)
        .collect();

    // A name made only of dots would read as a traversal component.
    if sanitized.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        sanitized.replace("..", "_")
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("base_url", &self.base_url)
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::file::LocalFileStorage;
    use atrium_test_utils::png_bytes;
    use axum::body::Bytes;

    fn service(dir: &tempfile::TempDir) -> FileService {
        let storage = Arc::new(LocalFileStorage::new(dir.path()));
        FileService::new(storage, "/uploads/", 1024)
    }

    fn upload(name: &str, content_type: &str, data: Vec<u8>) -> UploadedFile {
        UploadedFile {
            field: "images".to_string(),
            file_name: name.to_string(),
            content_type: Some(content_type.to_string()),
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.jpg"), "test.jpg");
        assert_eq!(sanitize_filename("my file.jpg"), "my_file.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("test<script>.jpg"), "test_script_.jpg");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = generate_key("photo.png");
        let b = generate_key("photo.png");
        assert_ne!(a, b);
        assert!(a.ends_with("_photo.png"));
    }

    #[test]
    fn test_key_for_rejects_foreign_references() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(&dir);

        assert_eq!(files.key_for("/uploads/abc_x.png"), Some("abc_x.png"));
        assert_eq!(files.key_for("/uploads/"), None);
        assert_eq!(files.key_for("/uploads/../secret"), None);
        assert_eq!(files.key_for("/uploads/nested/x.png"), None);
        assert_eq!(files.key_for("/uploadsx.png"), None);
        assert_eq!(files.key_for("https://cdn.example.com/x.png"), None);
    }

    #[test]
    fn test_validate_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(&dir);

        let png = upload("a.png", "application/octet-stream", png_bytes(1));
        assert_eq!(files.validate(&png).unwrap(), "image/png");

        let opaque = upload("a.png", "image/png", vec![0x10, 0x20, 0x30, 0x40, 0x50]);
        // Unsniffable content falls back to the declared type.
        assert_eq!(files.validate(&opaque).unwrap(), "image/png");

        let script = upload("a.sh", "text/x-shellscript", b"#!/bin/sh".to_vec());
        assert!(matches!(
            files.validate(&script),
            Err(UploadError::UnsupportedType(_))
        ));

        let big = upload("big.png", "image/png", vec![0u8; 2048]);
        assert!(matches!(
            files.validate(&big),
            Err(UploadError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_and_remove_reference() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(&dir);

        let reference = files
            .store(&upload("cover.png", "image/png", png_bytes(3)))
            .await
            .unwrap();
        assert!(reference.starts_with("/uploads/"));
        assert!(files.exists(&reference).await);

        files.remove_reference(&reference).await;
        assert!(!files.exists(&reference).await);

        // Removing again only logs.
        files.remove_reference(&reference).await;
    }

    #[tokio::test]
    async fn test_store_all_validates_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(&dir);

        let batch = vec![
            upload("ok.png", "image/png", png_bytes(1)),
            upload("bad.txt", "text/plain", b"plain".to_vec()),
        ];
        assert!(files.store_all(&batch).await.is_err());

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_store_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let files = service(&dir);

        let batch = vec![
            upload("first.png", "image/png", png_bytes(1)),
            upload("second.png", "image/png", png_bytes(2)),
        ];
        let references = files.store_all(&batch).await.unwrap();

        assert_eq!(references.len(), 2);
        assert!(references[0].ends_with("_first.png"));
        assert!(references[1].ends_with("_second.png"));
    }
}
