//! Database models.

pub mod banner;
pub mod blog;
pub mod course;
pub mod role;
pub mod user;

pub use banner::Banner;
pub use blog::{Blog, CreateBlog, UpdateBlog};
pub use course::{ContactLinks, Course, CourseModule, CreateCourse, UpdateCourse};
pub use role::Role;
pub use user::{CreateUser, User};

/// Whether a model error was caused by a unique constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .filter_map(sqlx::Error::as_database_error)
        .any(|db| db.is_unique_violation())
}
