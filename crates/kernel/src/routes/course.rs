//! Course routes.
//!
//! Admin CRUD under `/admin/course` plus the public read surface.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use super::{MessageResponse, parse_id};
use crate::error::{AppError, AppResult};
use crate::file::{FileService, UploadError};
use crate::form::{FileField, MultipartForm};
use crate::middleware::AuthUser;
use crate::models::{ContactLinks, Course, CourseModule, CreateCourse, UpdateCourse};
use crate::state::AppState;

/// File fields a course form accepts.
const COURSE_FILES: &[FileField] = &[FileField::new("image", 1), FileField::new("banner", 1)];

#[derive(Debug, Serialize)]
struct CourseResponse {
    success: bool,
    course: Course,
}

#[derive(Debug, Serialize)]
struct CourseListResponse {
    success: bool,
    courses: Vec<Course>,
}

/// Admin course routes, mounted under the admin gate.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/course", get(list_courses).post(create_course))
        .route(
            "/admin/course/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
}

/// Public read-only course routes.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/course", get(list_courses))
        .route("/course/{id}", get(get_course))
}

/// Newly stored course files.
#[derive(Debug, Default)]
struct StoredCourseFiles {
    image: Option<String>,
    banner: Option<String>,
}

impl StoredCourseFiles {
    fn references(&self) -> Vec<&str> {
        self.image.iter().chain(self.banner.iter()).map(String::as_str).collect()
    }
}

/// Validate and store the `image` and `banner` uploads of a course form.
async fn store_course_files(
    files: &FileService,
    form: &mut MultipartForm,
) -> Result<StoredCourseFiles, UploadError> {
    let image = form.take_file("image");
    let banner = form.take_file("banner");

    let uploads: Vec<_> = image.iter().chain(banner.iter()).cloned().collect();
    let mut references = files.store_all(&uploads).await?.into_iter();

    Ok(StoredCourseFiles {
        image: image.and_then(|_| references.next()),
        banner: banner.and_then(|_| references.next()),
    })
}

fn text(form: &MultipartForm, name: &str) -> String {
    form.text(name).map(str::to_string).unwrap_or_default()
}

fn optional_text(form: &MultipartForm, name: &str) -> Option<String> {
    form.text(name).map(str::to_string)
}

/// GET /admin/course, GET /course
async fn list_courses(State(state): State<AppState>) -> AppResult<Json<CourseListResponse>> {
    let courses = Course::list(state.db()).await?;
    Ok(Json(CourseListResponse {
        success: true,
        courses,
    }))
}

/// GET /admin/course/{id}, GET /course/{id}
async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CourseResponse>> {
    let id = parse_id(&id, "course")?;
    let course = Course::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Course not found"))?;

    Ok(Json(CourseResponse {
        success: true,
        course,
    }))
}

/// POST /admin/course
async fn create_course(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<CourseResponse>)> {
    let files = state.files();
    let mut form = MultipartForm::parse(multipart?, COURSE_FILES, files.max_file_size()).await?;

    let title = form.required("title")?.to_string();
    let price = form.number("price")?.unwrap_or(0.0);
    let sale_price = form.number("salePrice")?.unwrap_or(0.0);
    let modules = form
        .json::<Vec<CourseModule>>("modules")?
        .unwrap_or_default();

    let mut input = CreateCourse {
        title,
        description: text(&form, "description"),
        duration: text(&form, "duration"),
        timing: text(&form, "timing"),
        language: text(&form, "language"),
        seat: text(&form, "seat"),
        price,
        sale_price,
        contact_links: ContactLinks {
            whats_app: text(&form, "whatsAppLink"),
            telegram: text(&form, "telegramLink"),
        },
        modules,
        ..Default::default()
    };

    let stored = store_course_files(files, &mut form).await?;
    input.image = stored.image.clone().unwrap_or_default();
    input.banner = stored.banner.clone().unwrap_or_default();

    let course = match Course::create(state.db(), input).await {
        Ok(course) => course,
        Err(e) => {
            files.discard(&stored.references()).await;
            return Err(e.into());
        }
    };

    info!(
        course_id = %course.id,
        admin = %admin.user_name,
        title = %course.title,
        "course created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            success: true,
            course,
        }),
    ))
}

/// PUT /admin/course/{id}
async fn update_course(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<CourseResponse>> {
    let id = parse_id(&id, "course")?;
    let files = state.files();
    let mut form = MultipartForm::parse(multipart?, COURSE_FILES, files.max_file_size()).await?;

    let price = form.number("price")?;
    let sale_price = form.number("salePrice")?;
    let modules = form.json::<Vec<CourseModule>>("modules")?;

    let existing = Course::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Course not found"))?;

    let stored = store_course_files(files, &mut form).await?;

    let input = UpdateCourse {
        title: optional_text(&form, "title"),
        description: optional_text(&form, "description"),
        image: stored.image.clone(),
        banner: stored.banner.clone(),
        duration: optional_text(&form, "duration"),
        timing: optional_text(&form, "timing"),
        language: optional_text(&form, "language"),
        seat: optional_text(&form, "seat"),
        price,
        sale_price,
        whats_app: optional_text(&form, "whatsAppLink"),
        telegram: optional_text(&form, "telegramLink"),
        modules,
    };

    let course = match Course::update(state.db(), id, input).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            files.discard(&stored.references()).await;
            return Err(AppError::NotFound("Course not found"));
        }
        Err(e) => {
            files.discard(&stored.references()).await;
            return Err(e.into());
        }
    };

    // Files replaced by this update are no longer referenced.
    if stored.image.is_some() && existing.image != course.image {
        files.remove_reference(&existing.image).await;
    }
    if stored.banner.is_some() && existing.banner != course.banner {
        files.remove_reference(&existing.banner).await;
    }

    info!(course_id = %course.id, admin = %admin.user_name, "course updated");

    Ok(Json(CourseResponse {
        success: true,
        course,
    }))
}

/// DELETE /admin/course/{id}
async fn delete_course(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "course")?;
    let course = Course::delete(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Course not found"))?;

    let references: Vec<&str> = course.file_references().collect();
    state.files().discard(&references).await;

    info!(course_id = %course.id, admin = %admin.user_name, "course deleted");

    Ok(Json(MessageResponse::new("Course and images deleted successfully")))
}
