//! Signed session tokens and the cookie that carries them.
//!
//! A token is an HS256 JWT holding the user's id, email, name and role. It is
//! stateless: logout only clears the cookie, and a copied token stays valid
//! until it expires.

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Role, User};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Token issuer claim.
pub const ISSUER: &str = "atrium";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub user_name: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Issues and verifies session tokens, and builds the session cookie.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: i64,
    cookie_max_age_secs: i64,
    cookie_secure: bool,
    cookie_same_site: SameSite,
}

impl TokenService {
    /// Create a token service. The secret must be at least 32 bytes.
    pub fn new(jwt_secret: &[u8], token_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret),
            decoding_key: DecodingKey::from_secret(jwt_secret),
            token_ttl_secs,
            cookie_max_age_secs: 7200,
            cookie_secure: true,
            cookie_same_site: SameSite::Strict,
        }
    }

    /// Build the token service described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let same_site = parse_same_site(&config.cookie_same_site)?;
        Ok(Self::new(config.jwt_secret.as_bytes(), config.token_ttl_secs)
            .with_cookie(config.cookie_max_age_secs, config.cookie_secure, same_site))
    }

    /// Override the cookie attributes.
    pub fn with_cookie(mut self, max_age_secs: i64, secure: bool, same_site: SameSite) -> Self {
        self.cookie_max_age_secs = max_age_secs;
        self.cookie_secure = secure;
        self.cookie_same_site = same_site;
        self
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            user_name: user.user_name.clone(),
            role: user.role,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + self.token_ttl_secs,
        };

        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("failed to encode session token")
    }

    /// Verify signature, expiry and issuer, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .context("invalid token")?;

        Ok(data.claims)
    }

    /// Cookie carrying a freshly issued token.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .path("/")
            .secure(self.cookie_secure)
            .same_site(self.cookie_same_site)
            .max_age(Duration::seconds(self.cookie_max_age_secs))
            .build()
    }

    /// Cookie that makes the client drop the session token.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .path("/")
            .secure(self.cookie_secure)
            .same_site(self.cookie_same_site)
            .max_age(Duration::ZERO)
            .build()
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("cookie_max_age_secs", &self.cookie_max_age_secs)
            .finish()
    }
}

/// Session token from the request's `Cookie` headers, if any.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|c| c.ok())
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

/// Parse a `SameSite` setting.
pub fn parse_same_site(value: &str) -> Result<SameSite> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        other => anyhow::bail!("invalid cookie SameSite value: {other}"),
    }
}
