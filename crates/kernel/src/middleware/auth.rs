//! Admin gate for `/admin/**`.
//!
//! Reads the session token cookie, verifies it and requires the admin role.
//! API clients get a 401 JSON envelope; browser navigation (`Accept:
//! text/html`) is redirected instead. An invalid or expired token also gets
//! its cookie cleared.

use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::header::{ACCEPT, SET_COOKIE},
    http::{HeaderMap, Request, StatusCode, request::Parts},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::error::{AppError, ErrorBody};
use crate::session::{Claims, TokenService, token_from_headers};
use crate::state::AppState;

/// Where browsers are sent when they lack the admin role.
pub const UNAUTHORIZED_PAGE: &str = "/unauth-page";

/// Where browsers are sent when their session is no longer valid.
pub const LOGIN_PAGE: &str = "/login";

/// Verified identity of the caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(Denial::MissingToken.message().to_string()))
    }
}

/// Why the gate turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    MissingToken,
    InvalidToken,
    NotAdmin,
}

impl Denial {
    fn message(self) -> &'static str {
        match self {
            Denial::MissingToken => "Authentication required",
            Denial::InvalidToken => "Invalid or expired token",
            Denial::NotAdmin => "Admin access required",
        }
    }

    fn redirect_target(self) -> &'static str {
        match self {
            Denial::InvalidToken => LOGIN_PAGE,
            Denial::MissingToken | Denial::NotAdmin => UNAUTHORIZED_PAGE,
        }
    }

    fn clears_cookie(self) -> bool {
        matches!(self, Denial::InvalidToken)
    }
}

/// Decide whether a token grants admin access.
pub fn authorize_admin(tokens: &TokenService, token: Option<&str>) -> Result<Claims, Denial> {
    let token = token.ok_or(Denial::MissingToken)?;

    let claims = tokens.verify(token).map_err(|e| {
        debug!(error = %e, "rejecting session token");
        Denial::InvalidToken
    })?;

    if !claims.is_admin() {
        return Err(Denial::NotAdmin);
    }

    Ok(claims)
}

/// Whether the request is a browser page navigation.
fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn deny(tokens: &TokenService, denial: Denial, html: bool) -> Response {
    let cookies: Vec<(axum::http::HeaderName, String)> = if denial.clears_cookie() {
        vec![(SET_COOKIE, tokens.clear_cookie().to_string())]
    } else {
        Vec::new()
    };

    if html {
        return (
            AppendHeaders(cookies),
            Redirect::to(denial.redirect_target()),
        )
            .into_response();
    }

    (
        StatusCode::UNAUTHORIZED,
        AppendHeaders(cookies),
        Json(ErrorBody {
            success: false,
            message: denial.message().to_string(),
        }),
    )
        .into_response()
}

/// Middleware requiring an admin session.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = token_from_headers(request.headers());

    match authorize_admin(state.tokens(), token.as_deref()) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser(claims));
            next.run(request).await
        }
        Err(denial) => {
            debug!(path = %request.uri().path(), ?denial, "admin gate denied request");
            deny(state.tokens(), denial, wants_html(request.headers()))
        }
    }
}
