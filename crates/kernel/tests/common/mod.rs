#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Tests drive the REAL router and state against a PostgreSQL database named
//! by `DATABASE_URL`. When it is unset, [`shared_app`] returns `None` and the
//! tests return early.
//!
//! ## Runtime Safety
//!
//! The shared `TestApp` is initialized on a long-lived, multi-threaded Tokio
//! runtime that outlives any individual test, so pooled connections stay
//! valid across tests.

#![allow(dead_code)]

use std::path::PathBuf;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use atrium_kernel::config::Config;
use atrium_kernel::db;
use atrium_kernel::models::{CreateUser, Role, User};
use atrium_kernel::routes;
use atrium_kernel::state::AppState;
use atrium_test_utils::MultipartBuilder;

/// Password given to every seeded test account.
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Shared Tokio runtime that outlives all individual test runtimes.
pub static SHARED_RT: std::sync::LazyLock<tokio::runtime::Runtime> =
    std::sync::LazyLock::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build shared test runtime")
    });

/// Global shared test app, `None` when no database is configured.
static SHARED_APP: std::sync::OnceLock<Option<TestApp>> = std::sync::OnceLock::new();

/// Get a reference to the shared [`TestApp`], if a database is available.
pub async fn shared_app() -> Option<&'static TestApp> {
    SHARED_APP
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let database_url = std::env::var("DATABASE_URL").ok()?;

            let handle = SHARED_RT.handle().clone();
            let app = std::thread::spawn(move || handle.block_on(TestApp::new(database_url)))
                .join()
                .expect("TestApp init thread panicked");
            Some(app)
        })
        .as_ref()
}

/// Run an async test body on [`SHARED_RT`].
pub fn run_test<F: std::future::Future<Output = ()> + Send>(f: F) {
    SHARED_RT.block_on(f);
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub db: PgPool,
    pub state: AppState,
    /// Temporary directory uploads are written to.
    uploads: tempfile::TempDir,
}

impl TestApp {
    async fn new(database_url: String) -> Self {
        let uploads = tempfile::tempdir().expect("Failed to create uploads dir");

        let config = Config {
            port: 0,
            database_url,
            database_max_connections: 10,
            uploads_dir: uploads.path().to_path_buf(),
            uploads_url: "/uploads".to_string(),
            max_upload_bytes: 1024 * 1024,
            max_request_bytes: 8 * 1024 * 1024,
            jwt_secret: "integration-test-secret-that-is-long-enough".to_string(),
            token_ttl_secs: 3600,
            cookie_max_age_secs: 7200,
            cookie_secure: false,
            cookie_same_site: "strict".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
        };

        let db = db::create_pool(&config)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&db)
            .await
            .expect("Failed to run migrations");

        let state = AppState::from_pool(db.clone(), &config).expect("Failed to build AppState");
        let router = routes::app(state.clone(), &config);

        // Open every pool connection on SHARED_RT up front.
        {
            let mut conns = Vec::new();
            for _ in 0..config.database_max_connections {
                if let Ok(c) = db.acquire().await {
                    conns.push(c);
                }
            }
            drop(conns);
        }

        Self {
            router,
            db,
            state,
            uploads,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request with cookies from a previous response.
    pub async fn request_with_cookies(&self, mut request: Request<Body>, cookies: &str) -> Response {
        if !cookies.is_empty() {
            request.headers_mut().insert(
                header::COOKIE,
                cookies.parse().expect("Invalid cookie header"),
            );
        }
        self.request(request).await
    }

    /// Send a JSON body.
    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.request(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Send a multipart body with the given method and session cookies.
    pub async fn send_form(
        &self,
        method: &str,
        uri: &str,
        form: MultipartBuilder,
        cookies: &str,
    ) -> Response {
        let (content_type, body) = form.build();
        self.request_with_cookies(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
            cookies,
        )
        .await
    }

    /// GET with session cookies.
    pub async fn get(&self, uri: &str, cookies: &str) -> Response {
        self.request_with_cookies(Request::get(uri).body(Body::empty()).unwrap(), cookies)
            .await
    }

    /// DELETE with session cookies.
    pub async fn delete(&self, uri: &str, cookies: &str) -> Response {
        self.request_with_cookies(Request::delete(uri).body(Body::empty()).unwrap(), cookies)
            .await
    }

    /// Login via the JSON API and return session cookies.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post_json(
                "/auth/login",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;

        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Login failed for '{email}' (status {})",
            response.status()
        );

        extract_cookies(&response)
    }

    /// Create a user directly in the database.
    pub async fn create_test_user(&self, user_name: &str, email: &str, role: Role) -> User {
        User::create(
            &self.db,
            CreateUser {
                user_name: user_name.to_string(),
                email: email.to_string(),
                password: Some(TEST_PASSWORD.to_string()),
                role,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create test user")
    }

    /// Create a fresh admin account and return its session cookies.
    pub async fn create_and_login_admin(&self) -> String {
        let suffix = atrium_test_utils::unique_suffix();
        let email = format!("admin-{suffix}@example.com");
        self.create_test_user(&format!("admin_{suffix}"), &email, Role::Admin)
            .await;
        self.login(&email, TEST_PASSWORD).await
    }

    /// Create a fresh regular account and return its session cookies.
    pub async fn create_and_login_user(&self) -> String {
        let suffix = atrium_test_utils::unique_suffix();
        let email = format!("user-{suffix}@example.com");
        self.create_test_user(&format!("user_{suffix}"), &email, Role::User)
            .await;
        self.login(&email, TEST_PASSWORD).await
    }

    /// Path on disk of a stored upload reference.
    pub fn upload_path(&self, reference: &str) -> PathBuf {
        let key = reference.trim_start_matches("/uploads/");
        self.uploads.path().join(key)
    }

    /// Number of stored uploads whose original name was `file_name`.
    ///
    /// Stored names end with the sanitized original name, so tests give
    /// their uploads unique names to stay independent of each other.
    pub fn uploads_named(&self, file_name: &str) -> usize {
        let suffix = format!("_{file_name}");
        std::fs::read_dir(self.uploads.path())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().ends_with(&suffix))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Number of blogs with the given title.
    pub async fn count_blogs_titled(&self, title: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM blog WHERE title = $1")
            .bind(title)
            .fetch_one(&self.db)
            .await
            .expect("Failed to count blogs")
    }

    /// Remove a course created by a test.
    pub async fn cleanup_course(&self, id: Uuid) {
        sqlx::query("DELETE FROM course WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .ok();
    }
}

/// Read a response body as JSON.
pub async fn json_body(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

/// Extract Set-Cookie headers from a response for use in subsequent requests.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| {
            // Extract just the cookie name=value, ignoring attributes
            cookie.split(';').next()
        })
        .collect::<Vec<_>>()
        .join("; ")
}
