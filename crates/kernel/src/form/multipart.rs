//! Multipart form parsing.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::file::UploadError;

/// Map a body read failure. Exceeding the request body limit is a 413.
fn read_error(e: MultipartError, context: &str) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge("request body too large".to_string());
    }
    AppError::BadRequest(format!("{context}: {}", e.body_text()))
}

/// A file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field the file was sent under.
    pub field: String,
    /// Client-supplied filename.
    pub file_name: String,
    /// Client-declared MIME type.
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A file field a form accepts, with the maximum number of files.
#[derive(Debug, Clone, Copy)]
pub struct FileField {
    pub name: &'static str,
    pub max_count: usize,
}

impl FileField {
    pub const fn new(name: &'static str, max_count: usize) -> Self {
        Self { name, max_count }
    }
}

/// A parsed multipart body: scalar fields and file attachments by field name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    /// Read a multipart body, separating text fields from file parts.
    ///
    /// Files are only accepted under the names listed in `file_fields`, up
    /// to each field's `max_count`. Each file may be at most `max_file_size`
    /// bytes. File parts without content (an untouched file input) are
    /// skipped.
    pub async fn parse(
        mut multipart: Multipart,
        file_fields: &[FileField],
        max_file_size: usize,
    ) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| read_error(e, "malformed form data"))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| read_error(e, &format!("malformed form field '{name}'")))?;
                form.fields.insert(name, value);
                continue;
            };

            let Some(accepted) = file_fields.iter().find(|f| f.name == name) else {
                return Err(AppError::BadRequest(format!("unexpected file field '{name}'")));
            };

            let content_type = field.content_type().map(str::to_string);

            // Read in chunks so an oversized file is rejected without
            // buffering all of it.
            let mut data = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| read_error(e, &format!("failed to read file '{file_name}'")))?
            {
                if data.len() + chunk.len() > max_file_size {
                    return Err(UploadError::TooLarge {
                        size: data.len() + chunk.len(),
                        max: max_file_size,
                    }
                    .into());
                }
                data.extend_from_slice(&chunk);
            }

            if data.is_empty() {
                debug!(field = %name, "skipping empty file part");
                continue;
            }

            let files = form.files.entry(name.clone()).or_default();
            if files.len() >= accepted.max_count {
                return Err(AppError::BadRequest(format!(
                    "too many files for field '{name}' (max {})",
                    accepted.max_count
                )));
            }

            files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                data: Bytes::from(data),
            });
        }

        Ok(form)
    }

    /// Raw value of a text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Value of a text field that is present and not blank.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.text(name).filter(|v| !v.trim().is_empty())
    }

    /// Value of a required, non-blank text field.
    pub fn required(&self, name: &str) -> AppResult<&str> {
        self.non_empty(name)
            .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
    }

    /// Parse an optional non-negative number field.
    pub fn number(&self, name: &str) -> AppResult<Option<f64>> {
        let Some(raw) = self.non_empty(name) else {
            return Ok(None);
        };

        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
            _ => Err(AppError::BadRequest(format!(
                "{name} must be a non-negative number"
            ))),
        }
    }

    /// Parse an optional JSON-encoded field.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        let Some(raw) = self.non_empty(name) else {
            return Ok(None);
        };

        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| AppError::BadRequest(format!("{name} is not valid: {e}")))
    }

    /// Remove and return every file sent under `name`, in submission order.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Remove and return the first file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.take_files(name).into_iter().next()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use atrium_test_utils::{MultipartBuilder, png_bytes};
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{Request, header};

    async fn parse(builder: MultipartBuilder, fields: &[FileField]) -> AppResult<MultipartForm> {
        let (content_type, body) = builder.build();
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();
        MultipartForm::parse(multipart, fields, 1024).await
    }

    const IMAGES: &[FileField] = &[FileField::new("images", 2)];

    #[tokio::test]
    async fn test_separates_fields_and_files() {
        let builder = MultipartBuilder::new()
            .text("title", "Hello")
            .text("content", r#"[{"type":"image"}]"#)
            .file("images", "a.png", "image/png", &png_bytes(1))
            .file("images", "b.png", "image/png", &png_bytes(2));

        let mut form = parse(builder, IMAGES).await.unwrap();

        assert_eq!(form.text("title"), Some("Hello"));
        let files = form.take_files("images");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_name, "a.png");
        assert_eq!(files[1].file_name, "b.png");
        assert!(form.take_files("images").is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_file_field_rejected() {
        let builder = MultipartBuilder::new().file("avatar", "a.png", "image/png", &png_bytes(1));
        assert!(matches!(
            parse(builder, IMAGES).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_too_many_files_rejected() {
        let builder = MultipartBuilder::new()
            .file("images", "a.png", "image/png", &png_bytes(1))
            .file("images", "b.png", "image/png", &png_bytes(2))
            .file("images", "c.png", "image/png", &png_bytes(3));
        assert!(matches!(
            parse(builder, IMAGES).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let builder =
            MultipartBuilder::new().file("images", "big.png", "image/png", &vec![0u8; 4096]);
        assert!(matches!(
            parse(builder, IMAGES).await,
            Err(AppError::Upload(UploadError::TooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_empty_file_part_skipped() {
        let builder = MultipartBuilder::new().file("images", "", "application/octet-stream", b"");
        let mut form = parse(builder, IMAGES).await.unwrap();
        assert!(form.take_files("images").is_empty());
    }

    #[tokio::test]
    async fn test_typed_accessors() {
        let builder = MultipartBuilder::new()
            .text("price", "49.5")
            .text("salePrice", "")
            .text("seat", "abc")
            .text("modules", r#"[{"title":"M1"}]"#)
            .text("blank", "   ");

        let form = parse(builder, IMAGES).await.unwrap();

        assert_eq!(form.number("price").unwrap(), Some(49.5));
        assert_eq!(form.number("salePrice").unwrap(), None);
        assert!(form.number("seat").is_err());
        assert!(form.required("blank").is_err());
        assert!(form.required("missing").is_err());

        let modules: Option<Vec<serde_json::Value>> = form.json("modules").unwrap();
        assert_eq!(modules.unwrap()[0]["title"], "M1");
        assert!(form.json::<Vec<serde_json::Value>>("seat").is_err());
    }

    #[tokio::test]
    async fn test_negative_number_rejected() {
        let builder = MultipartBuilder::new().text("price", "-1");
        let form = parse(builder, IMAGES).await.unwrap();
        assert!(form.number("price").is_err());
    }

    #[tokio::test]
    async fn test_body_over_request_limit_is_payload_too_large() {
        use axum::extract::DefaultBodyLimit;
        use axum::response::{IntoResponse, Response};
        use axum::routing::post;
        use tower::ServiceExt;

        async fn handler(multipart: Multipart) -> Response {
            match MultipartForm::parse(multipart, IMAGES, 1024 * 1024).await {
                Ok(_) => StatusCode::OK.into_response(),
                Err(e) => e.into_response(),
            }
        }

        let app = axum::Router::new()
            .route("/", post(handler))
            .layer(DefaultBodyLimit::max(512));

        // Within the per-file limit, over the whole-request limit.
        let (content_type, body) = MultipartBuilder::new()
            .file("images", "big.png", "image/png", &vec![7u8; 4096])
            .build();
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
