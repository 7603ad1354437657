//! Atrium test utilities.
//!
//! Helpers for integration testing: multipart body building, content block
//! and course module fixtures, and small valid image payloads.

use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Bytes recognised as a PNG image, distinct per `seed`.
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    data.extend(std::iter::repeat_n(seed, 32));
    data
}

/// A text block in wire form.
pub fn text_block(value: &str) -> JsonValue {
    json!({ "type": "text", "value": value })
}

/// An image block pointing at an existing stored file.
pub fn image_block(reference: &str) -> JsonValue {
    json!({ "type": "image", "value": reference })
}

/// An image block waiting for an upload.
pub fn pending_image_block() -> JsonValue {
    json!({ "type": "image" })
}

/// Encode a block list the way the client sends it in the `content` field.
pub fn blocks_json(blocks: &[JsonValue]) -> String {
    JsonValue::Array(blocks.to_vec()).to_string()
}

/// A course module in wire form.
pub fn course_module(title: &str) -> JsonValue {
    json!({
        "title": title,
        "zoomLink": format!("https://zoom.example.com/{}", title.to_lowercase()),
        "downloadLink": format!("https://files.example.com/{}.pdf", title.to_lowercase()),
    })
}

/// A unique suffix for test records (emails, user names, titles).
pub fn unique_suffix() -> String {
    Uuid::now_v7().simple().to_string()[..12].to_string()
}

/// Builder for `multipart/form-data` request bodies.
#[derive(Debug, Clone)]
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBuilder {
    /// Start an empty body with a random boundary.
    pub fn new() -> Self {
        Self {
            boundary: format!("atrium-boundary-{}", Uuid::now_v7().simple()),
            body: Vec::new(),
        }
    }

    /// Add a text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    /// Add a file part.
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Finish the body, returning the `Content-Type` header value and bytes.
    pub fn build(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
