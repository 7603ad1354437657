//! Course model and CRUD operations.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

const COURSE_COLUMNS: &str = "id, title, description, image, banner, duration, timing, language, \
     seat, price, sale_price, whatsapp_link, telegram_link, modules, created_at, updated_at";

/// One curriculum module of a course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub zoom_link: String,
    #[serde(default)]
    pub download_link: String,
}

/// Contact links shown with a course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLinks {
    pub whats_app: String,
    pub telegram: String,
}

/// Course record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Reference of the cover image, empty when none was uploaded.
    pub image: String,
    pub banner: String,
    pub duration: String,
    pub timing: String,
    pub language: String,
    pub seat: String,
    pub price: f64,
    pub sale_price: f64,
    pub contact_links: ContactLinks,
    pub modules: Vec<CourseModule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    description: String,
    image: String,
    banner: String,
    duration: String,
    timing: String,
    language: String,
    seat: String,
    price: f64,
    sale_price: f64,
    whatsapp_link: String,
    telegram_link: String,
    modules: Json<Vec<CourseModule>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            image: row.image,
            banner: row.banner,
            duration: row.duration,
            timing: row.timing,
            language: row.language,
            seat: row.seat,
            price: row.price,
            sale_price: row.sale_price,
            contact_links: ContactLinks {
                whats_app: row.whatsapp_link,
                telegram: row.telegram_link,
            },
            modules: row.modules.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a course.
#[derive(Debug, Clone, Default)]
pub struct CreateCourse {
    pub title: String,
    pub description: String,
    pub image: String,
    pub banner: String,
    pub duration: String,
    pub timing: String,
    pub language: String,
    pub seat: String,
    pub price: f64,
    pub sale_price: f64,
    pub contact_links: ContactLinks,
    pub modules: Vec<CourseModule>,
}

/// Input for updating a course. `None` leaves the stored value in place.
#[derive(Debug, Clone, Default)]
pub struct UpdateCourse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub banner: Option<String>,
    pub duration: Option<String>,
    pub timing: Option<String>,
    pub language: Option<String>,
    pub seat: Option<String>,
    pub price: Option<f64>,
    pub sale_price: Option<f64>,
    pub whats_app: Option<String>,
    pub telegram: Option<String>,
    pub modules: Option<Vec<CourseModule>>,
}

impl Course {
    /// All courses, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM course ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list courses")?;

        Ok(rows.into_iter().map(Course::from).collect())
    }

    /// Find a course by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM course WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch course")?;

        Ok(row.map(Course::from))
    }

    /// Create a new course.
    pub async fn create(pool: &PgPool, input: CreateCourse) -> Result<Self> {
        let id = Uuid::now_v7();

        let row = sqlx::query_as::<_, CourseRow>(&format!(
            r#"
            INSERT INTO course (id, title, description, image, banner, duration, timing, language,
                                seat, price, sale_price, whatsapp_link, telegram_link, modules)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image)
        .bind(&input.banner)
        .bind(&input.duration)
        .bind(&input.timing)
        .bind(&input.language)
        .bind(&input.seat)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(&input.contact_links.whats_app)
        .bind(&input.contact_links.telegram)
        .bind(Json(&input.modules))
        .fetch_one(pool)
        .await
        .context("failed to create course")?;

        Ok(row.into())
    }

    /// Apply a partial update. Returns `None` when the course does not exist.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdateCourse) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            r#"
            UPDATE course SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                image = COALESCE($4, image),
                banner = COALESCE($5, banner),
                duration = COALESCE($6, duration),
                timing = COALESCE($7, timing),
                language = COALESCE($8, language),
                seat = COALESCE($9, seat),
                price = COALESCE($10, price),
                sale_price = COALESCE($11, sale_price),
                whatsapp_link = COALESCE($12, whatsapp_link),
                telegram_link = COALESCE($13, telegram_link),
                modules = COALESCE($14, modules),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.image)
        .bind(&input.banner)
        .bind(&input.duration)
        .bind(&input.timing)
        .bind(&input.language)
        .bind(&input.seat)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(&input.whats_app)
        .bind(&input.telegram)
        .bind(input.modules.as_ref().map(Json))
        .fetch_optional(pool)
        .await
        .context("failed to update course")?;

        Ok(row.map(Course::from))
    }

    /// Delete a course, returning the deleted record.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "DELETE FROM course WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to delete course")?;

        Ok(row.map(Course::from))
    }

    /// References of the files this course points at.
    pub fn file_references(&self) -> impl Iterator<Item = &str> {
        [self.image.as_str(), self.banner.as_str()]
            .into_iter()
            .filter(|r| !r.is_empty())
    }
}
