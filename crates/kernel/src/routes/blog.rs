//! Blog routes.
//!
//! Blog bodies arrive as a JSON block list in the `content` field next to the
//! new image files under `images`. Pending image blocks are matched with the
//! uploads in order before anything is written.

use std::collections::HashSet;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use super::{MessageResponse, parse_id};
use crate::content::{ContentBlock, CorrelationError, plan_correlation};
use crate::error::{AppError, AppResult};
use crate::file::FileService;
use crate::form::{FileField, MultipartForm, UploadedFile};
use crate::middleware::AuthUser;
use crate::models::{Blog, CreateBlog, UpdateBlog};
use crate::state::AppState;

/// Maximum number of images in one blog submission.
pub const MAX_BLOG_IMAGES: usize = 20;

const BLOG_FILES: &[FileField] = &[FileField::new("images", MAX_BLOG_IMAGES)];

#[derive(Debug, Serialize)]
struct BlogResponse {
    success: bool,
    blog: Blog,
}

#[derive(Debug, Serialize)]
struct BlogListResponse {
    success: bool,
    blogs: Vec<Blog>,
}

/// Admin blog routes, mounted under the admin gate.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/blog", get(list_blogs).post(create_blog))
        .route("/admin/blog/create", post(create_blog))
        .route(
            "/admin/blog/{id}",
            get(get_blog).put(update_blog).delete(delete_blog),
        )
}

/// Public blog routes.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(list_blogs))
        .route("/blog/{id}", get(view_blog))
        .route("/blog/{id}/like", post(like_blog))
}

/// Store the uploads for the pending image blocks and fill them in.
///
/// Returns the completed blocks and the references written for this request,
/// so the caller can discard them if persisting fails.
async fn resolve_content(
    files: &FileService,
    mut blocks: Vec<ContentBlock>,
    uploads: &[UploadedFile],
) -> AppResult<(Vec<ContentBlock>, Vec<String>)> {
    let plan = plan_correlation(&blocks, uploads.len(), |v| files.is_reference(v))?;

    let references = files.store_all(uploads).await?;
    if let Err(e) = plan.apply(&mut blocks, references.clone()) {
        files.discard(&references).await;
        return Err(e.into());
    }

    Ok((blocks, references))
}

fn parse_content(raw: &str) -> AppResult<Vec<ContentBlock>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::BadRequest(format!("content is not a valid block list: {e}")))
}

/// GET /admin/blog, GET /blog
async fn list_blogs(State(state): State<AppState>) -> AppResult<Json<BlogListResponse>> {
    let blogs = Blog::list(state.db()).await?;
    Ok(Json(BlogListResponse {
        success: true,
        blogs,
    }))
}

/// GET /admin/blog/{id}
async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BlogResponse>> {
    let id = parse_id(&id, "blog")?;
    let blog = Blog::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Blog not found"))?;

    Ok(Json(BlogResponse {
        success: true,
        blog,
    }))
}

/// GET /blog/{id}: counts a view.
async fn view_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BlogResponse>> {
    let id = parse_id(&id, "blog")?;
    let blog = Blog::record_view(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Blog not found"))?;

    Ok(Json(BlogResponse {
        success: true,
        blog,
    }))
}

/// POST /blog/{id}/like
async fn like_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BlogResponse>> {
    let id = parse_id(&id, "blog")?;
    let blog = Blog::like(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Blog not found"))?;

    Ok(Json(BlogResponse {
        success: true,
        blog,
    }))
}

/// POST /admin/blog, POST /admin/blog/create
async fn create_blog(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<BlogResponse>)> {
    let files = state.files();
    let mut form = MultipartForm::parse(multipart?, BLOG_FILES, files.max_file_size()).await?;

    let (Some(title), Some(raw_content)) = (form.non_empty("title"), form.non_empty("content"))
    else {
        return Err(AppError::BadRequest("Title or content missing".to_string()));
    };
    let title = title.to_string();
    let blocks = parse_content(raw_content)?;
    let uploads = form.take_files("images");

    let (content, stored) = resolve_content(files, blocks, &uploads).await?;

    let blog = match Blog::create(state.db(), CreateBlog { title, content }).await {
        Ok(blog) => blog,
        Err(e) => {
            files.discard(&stored).await;
            return Err(e.into());
        }
    };

    info!(blog_id = %blog.id, admin = %admin.user_name, images = stored.len(), "blog created");

    Ok((
        StatusCode::CREATED,
        Json(BlogResponse {
            success: true,
            blog,
        }),
    ))
}

/// PUT /admin/blog/{id}
async fn update_blog(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<BlogResponse>> {
    let id = parse_id(&id, "blog")?;
    let files = state.files();
    let mut form = MultipartForm::parse(multipart?, BLOG_FILES, files.max_file_size()).await?;

    let title = form.text("title").map(str::to_string);
    let blocks = form.non_empty("content").map(parse_content).transpose()?;
    let uploads = form.take_files("images");

    let existing = Blog::find_by_id(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Blog not found"))?;

    let (content, stored) = match blocks {
        Some(blocks) => {
            let (content, stored) = resolve_content(files, blocks, &uploads).await?;
            (Some(content), stored)
        }
        None if uploads.is_empty() => (None, Vec::new()),
        None => {
            return Err(CorrelationError::SurplusUploads {
                expected: 0,
                supplied: uploads.len(),
            }
            .into());
        }
    };

    let blog = match Blog::update(state.db(), id, UpdateBlog { title, content }).await {
        Ok(Some(blog)) => blog,
        Ok(None) => {
            files.discard(&stored).await;
            return Err(AppError::NotFound("Blog not found"));
        }
        Err(e) => {
            files.discard(&stored).await;
            return Err(e.into());
        }
    };

    // Images dropped from the block list are no longer referenced.
    let dropped: Vec<&str> = {
        let kept: HashSet<&str> = blog.file_references().collect();
        existing
            .file_references()
            .filter(|r| !kept.contains(r))
            .collect()
    };
    files.discard(&dropped).await;

    info!(
        blog_id = %blog.id,
        admin = %admin.user_name,
        images = stored.len(),
        removed = dropped.len(),
        "blog updated"
    );

    Ok(Json(BlogResponse {
        success: true,
        blog,
    }))
}

/// DELETE /admin/blog/{id}
async fn delete_blog(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "blog")?;
    let blog = Blog::delete(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Blog not found"))?;

    let references: Vec<&str> = blog.file_references().collect();
    state.files().discard(&references).await;

    info!(blog_id = %blog.id, admin = %admin.user_name, images = references.len(), "blog deleted");

    Ok(Json(MessageResponse::new(
        "Blog and associated images deleted successfully",
    )))
}
