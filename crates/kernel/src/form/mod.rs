//! Submitted form handling.
//!
//! Entity forms arrive as multipart bodies: scalar text fields next to file
//! attachments, with nested structures (course modules, blog content) sent
//! as JSON-encoded text fields.

mod multipart;

pub use multipart::{FileField, MultipartForm, UploadedFile};
