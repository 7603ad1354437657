//! Promotional banner model.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Banner record: a single stored image reference.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: Uuid,
    pub banner: String,
    pub created_at: DateTime<Utc>,
}

impl Banner {
    /// All banners, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Banner>(
            "SELECT id, banner, created_at FROM banner ORDER BY created_at DESC",
        )
        .fetch_all(pool)
        .await
        .context("failed to list banners")
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        sqlx::query_as::<_, Banner>("SELECT id, banner, created_at FROM banner WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch banner")
    }

    /// Create a banner for a stored file reference.
    pub async fn create(pool: &PgPool, reference: &str) -> Result<Self> {
        sqlx::query_as::<_, Banner>(
            "INSERT INTO banner (id, banner) VALUES ($1, $2) RETURNING id, banner, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(reference)
        .fetch_one(pool)
        .await
        .context("failed to create banner")
    }

    /// Delete a banner, returning the deleted record.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        sqlx::query_as::<_, Banner>(
            "DELETE FROM banner WHERE id = $1 RETURNING id, banner, created_at",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to delete banner")
    }
}
