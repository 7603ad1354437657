//! Banner routes.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use super::{MessageResponse, parse_id};
use crate::error::{AppError, AppResult};
use crate::form::{FileField, MultipartForm};
use crate::middleware::AuthUser;
use crate::models::{Banner, is_unique_violation};
use crate::state::AppState;

const BANNER_FILES: &[FileField] = &[FileField::new("banner", 1)];

#[derive(Debug, Serialize)]
struct BannerResponse {
    success: bool,
    banner: Banner,
}

#[derive(Debug, Serialize)]
struct BannerListResponse {
    success: bool,
    banners: Vec<Banner>,
}

/// Admin banner routes, mounted under the admin gate.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/banner", get(list_banners).post(create_banner))
        .route("/admin/banner/{id}", delete(delete_banner))
}

/// Public banner listing.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/banner", get(list_banners))
}

/// GET /admin/banner, GET /banner
async fn list_banners(State(state): State<AppState>) -> AppResult<Json<BannerListResponse>> {
    let banners = Banner::list(state.db()).await?;
    Ok(Json(BannerListResponse {
        success: true,
        banners,
    }))
}

/// POST /admin/banner
async fn create_banner(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<BannerResponse>)> {
    let files = state.files();
    let mut form = MultipartForm::parse(multipart?, BANNER_FILES, files.max_file_size()).await?;

    let upload = form
        .take_file("banner")
        .ok_or_else(|| AppError::BadRequest("banner file is required".to_string()))?;

    let reference = files.store(&upload).await?;

    let banner = match Banner::create(state.db(), &reference).await {
        Ok(banner) => banner,
        Err(e) => {
            files.remove_reference(&reference).await;
            if is_unique_violation(&e) {
                return Err(AppError::Conflict("Banner already exists".to_string()));
            }
            return Err(e.into());
        }
    };

    info!(
        banner_id = %banner.id,
        admin = %admin.user_name,
        reference = %banner.banner,
        "banner created"
    );

    Ok((
        StatusCode::CREATED,
        Json(BannerResponse {
            success: true,
            banner,
        }),
    ))
}

/// DELETE /admin/banner/{id}
async fn delete_banner(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "banner")?;
    let banner = Banner::delete(state.db(), id)
        .await?
        .ok_or(AppError::NotFound("Banner not found"))?;

    state.files().remove_reference(&banner.banner).await;

    info!(banner_id = %banner.id, admin = %admin.user_name, "banner deleted");

    Ok(Json(MessageResponse::new("Banner deleted successfully")))
}
