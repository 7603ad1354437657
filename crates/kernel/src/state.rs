//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::file::{FileService, LocalFileStorage};
use crate::session::TokenService;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Upload validation and storage.
    files: FileService,

    /// Session token issuing and verification.
    tokens: TokenService,
}

impl AppState {
    /// Connect to the database, apply migrations and build the services.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        Self::from_pool(db, config)
    }

    /// Build the state around an existing pool.
    pub fn from_pool(db: PgPool, config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.uploads_dir).with_context(|| {
            format!(
                "failed to create uploads directory {}",
                config.uploads_dir.display()
            )
        })?;

        let storage = Arc::new(LocalFileStorage::new(&config.uploads_dir));
        let files = FileService::new(storage, &config.uploads_url, config.max_upload_bytes);
        info!(
            dir = %config.uploads_dir.display(),
            url = %files.base_url(),
            "file storage initialized"
        );

        let tokens = TokenService::from_config(config)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { db, files, tokens }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the file service.
    pub fn files(&self) -> &FileService {
        &self.inner.files
    }

    /// Get the token service.
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }
}
