//! File and media management.
//!
//! Provides upload validation, storage, and cleanup of referenced files.

pub mod service;
pub mod storage;

pub use service::{ALLOWED_MIME_TYPES, FileService, MAX_FILE_SIZE, UploadError};
pub use storage::{FileStorage, LocalFileStorage};
