//! Blog model and CRUD operations.
//!
//! A blog body is an ordered list of content blocks stored inline as JSONB.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::content::{ContentBlock, image_references};

const BLOG_COLUMNS: &str = "id, title, content, likes, views, created_at, updated_at";

/// Blog record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: Uuid,
    pub title: String,
    pub content: Vec<ContentBlock>,
    pub likes: i64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct BlogRow {
    id: Uuid,
    title: String,
    content: Json<Vec<ContentBlock>>,
    likes: i64,
    views: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BlogRow> for Blog {
    fn from(row: BlogRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content.0,
            likes: row.likes,
            views: row.views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a blog.
#[derive(Debug, Clone)]
pub struct CreateBlog {
    pub title: String,
    pub content: Vec<ContentBlock>,
}

/// Input for updating a blog. A supplied block list replaces the stored one.
#[derive(Debug, Clone, Default)]
pub struct UpdateBlog {
    pub title: Option<String>,
    pub content: Option<Vec<ContentBlock>>,
}

impl Blog {
    /// All blogs, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, BlogRow>(&format!(
            "SELECT {BLOG_COLUMNS} FROM blog ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list blogs")?;

        Ok(rows.into_iter().map(Blog::from).collect())
    }

    /// Find a blog by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "SELECT {BLOG_COLUMNS} FROM blog WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch blog")?;

        Ok(row.map(Blog::from))
    }

    /// Create a new blog.
    pub async fn create(pool: &PgPool, input: CreateBlog) -> Result<Self> {
        let id = Uuid::now_v7();

        let row = sqlx::query_as::<_, BlogRow>(&format!(
            r#"
            INSERT INTO blog (id, title, content)
            VALUES ($1, $2, $3)
            RETURNING {BLOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(Json(&input.content))
        .fetch_one(pool)
        .await
        .context("failed to create blog")?;

        Ok(row.into())
    }

    /// Apply a partial update. Returns `None` when the blog does not exist.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdateBlog) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            r#"
            UPDATE blog SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BLOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(input.content.as_ref().map(Json))
        .fetch_optional(pool)
        .await
        .context("failed to update blog")?;

        Ok(row.map(Blog::from))
    }

    /// Delete a blog, returning the deleted record.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "DELETE FROM blog WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to delete blog")?;

        Ok(row.map(Blog::from))
    }

    /// Count a view and return the updated record.
    pub async fn record_view(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "UPDATE blog SET views = views + 1 WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to record blog view")?;

        Ok(row.map(Blog::from))
    }

    /// Count a like and return the updated record.
    pub async fn like(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, BlogRow>(&format!(
            "UPDATE blog SET likes = likes + 1 WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to like blog")?;

        Ok(row.map(Blog::from))
    }

    /// References of the images in this blog's content.
    pub fn file_references(&self) -> impl Iterator<Item = &str> {
        image_references(&self.content)
    }
}
