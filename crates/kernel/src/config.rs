//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::file::MAX_FILE_SIZE;

/// Minimum accepted length of the token signing secret, in bytes.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Directory uploaded files are written to (default: ./public/uploads).
    pub uploads_dir: PathBuf,

    /// Root-relative URL prefix stored in records and used to serve uploads
    /// (default: /uploads).
    pub uploads_url: String,

    /// Maximum size of a single uploaded file in bytes (default: 10 MiB).
    pub max_upload_bytes: usize,

    /// Maximum size of a whole request body in bytes (default: 64 MiB).
    pub max_request_bytes: usize,

    /// HMAC secret used to sign session tokens.
    pub jwt_secret: String,

    /// Lifetime of an issued session token in seconds (default: 3600).
    pub token_ttl_secs: i64,

    /// Max-Age of the session cookie in seconds (default: 7200).
    pub cookie_max_age_secs: i64,

    /// Whether the session cookie carries the Secure attribute (default: true).
    pub cookie_secure: bool,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/uploads"));

        let uploads_url = parse_uploads_url(
            &env::var("UPLOADS_URL").unwrap_or_else(|_| "/uploads".to_string()),
        )?;

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| MAX_FILE_SIZE.to_string())
            .parse()
            .context("MAX_UPLOAD_BYTES must be a valid usize")?;

        let max_request_bytes = env::var("MAX_REQUEST_BYTES")
            .unwrap_or_else(|_| (64 * 1024 * 1024).to_string())
            .parse()
            .context("MAX_REQUEST_BYTES must be a valid usize")?;

        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let token_ttl_secs = env::var("TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .context("TOKEN_TTL_SECS must be a valid i64")?;

        let cookie_max_age_secs = env::var("COOKIE_MAX_AGE_SECS")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .context("COOKIE_MAX_AGE_SECS must be a valid i64")?;

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            uploads_dir,
            uploads_url,
            max_upload_bytes,
            max_request_bytes,
            jwt_secret,
            token_ttl_secs,
            cookie_max_age_secs,
            cookie_secure,
            cookie_same_site,
            cors_allowed_origins,
        })
    }
}

/// Normalize the URL prefix uploads are served under.
///
/// The prefix becomes a route, so it must be an absolute path below the
/// root and free of route syntax.
fn parse_uploads_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') {
        bail!("UPLOADS_URL must start with '/': {raw:?}");
    }

    let url = trimmed.trim_end_matches('/');
    if url.is_empty() {
        bail!("UPLOADS_URL must not be the site root");
    }
    if url.contains(['{', '}', '*', '?', '#', ' ']) || url.contains("//") {
        bail!("UPLOADS_URL must be a plain path: {raw:?}");
    }

    Ok(url.to_string())
}
