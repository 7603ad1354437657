//! Serving of uploaded files.

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::warn;

use crate::state::AppState;

/// Create the uploads router, serving stored files under the uploads prefix.
pub fn router(base_url: &str) -> Router<AppState> {
    Router::new().route(&format!("{base_url}/{{*path}}"), get(serve_upload))
}

/// Serve an uploaded file.
async fn serve_upload(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    // Stored files live flat in the uploads directory.
    let key = path.trim_start_matches('/');
    if key.is_empty() || key.contains("..") || key.contains(['/', '\\', '\0']) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let content = match state.files().read(key).await {
        Ok(content) => content,
        Err(e) => {
            if !is_not_found(&e) {
                warn!(key = %key, error = %format!("{e:#}"), "failed to read uploaded file");
            }
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let content_type = infer::get(&content)
        .map(|kind| kind.mime_type())
        .unwrap_or_else(|| mime_from_key(key));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Body::from(content),
    )
        .into_response()
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| io.kind() == std::io::ErrorKind::NotFound)
}

fn mime_from_key(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
