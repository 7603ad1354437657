//! Authentication routes (register, login, logout, Google account linking).

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{CreateUser, Role, User, is_unique_violation};
use crate::session::{Claims, token_from_headers};
use crate::state::AppState;

/// Create the authentication router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/google-register", post(google_register))
        .route("/auth/google-login", post(google_login))
        .route("/auth/check-auth", get(check_auth))
}

/// Registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Google registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub google_id: String,
    pub profile_picture: Option<String>,
}

/// Google login request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub google_id: String,
}

/// Public view of a user returned by the auth endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<Claims> for UserSummary {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            user_name: claims.user_name,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Auth response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Typed login failure, mapped to an explicit status code.
#[derive(Debug)]
enum LoginError {
    /// Unknown email or wrong password (401).
    InvalidCredentials,
    /// Unknown email or mismatched Google account (401).
    GoogleMismatch,
    /// Database or token failure (500).
    Internal(anyhow::Error),
}

impl From<LoginError> for AppError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".to_string())
            }
            LoginError::GoogleMismatch => AppError::Unauthorized("Google login failed".to_string()),
            LoginError::Internal(e) => AppError::Internal(e),
        }
    }
}

fn missing_fields(fields: &[&str]) -> bool {
    fields.iter().any(|f| f.trim().is_empty())
}

/// Issue a session for `user` and build the response carrying its cookie.
fn session_response(
    state: &AppState,
    status: StatusCode,
    message: &'static str,
    user: &User,
) -> AppResult<Response> {
    let token = state.tokens().issue(user)?;
    let cookie = state.tokens().session_cookie(token);

    Ok((
        status,
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Json(AuthResponse {
            success: true,
            message,
            user: Some(UserSummary::from(user)),
        }),
    )
        .into_response())
}

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(request) = body?;

    if missing_fields(&[
        request.email.as_str(),
        request.user_name.as_str(),
        request.password.as_str(),
    ]) {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }

    let email = request.email.trim().to_string();
    let user_name = request.user_name.trim().to_string();

    if User::find_by_email(state.db(), &email).await?.is_some()
        || User::find_by_user_name(state.db(), &user_name).await?.is_some()
    {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let input = CreateUser {
        user_name,
        email,
        password: Some(request.password),
        ..Default::default()
    };

    let user = match User::create(state.db(), input).await {
        Ok(user) => user,
        // A concurrent registration won the race for the same email or name.
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, user_name = %user.user_name, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully",
            user: Some(UserSummary::from(&user)),
        }),
    ))
}

async fn authenticate(state: &AppState, request: &LoginRequest) -> Result<User, LoginError> {
    let user = User::find_by_email(state.db(), request.email.trim())
        .await
        .map_err(LoginError::Internal)?
        .ok_or(LoginError::InvalidCredentials)?;

    if !user.verify_password(&request.password) {
        return Err(LoginError::InvalidCredentials);
    }

    Ok(user)
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = body?;

    if missing_fields(&[request.email.as_str(), request.password.as_str()]) {
        return Err(AppError::BadRequest("Email and password are required".to_string()));
    }

    let user = match authenticate(&state, &request).await {
        Ok(user) => user,
        Err(e) => {
            if matches!(e, LoginError::InvalidCredentials) {
                warn!(email = %request.email, "failed login attempt");
            }
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, role = %user.role, "user logged in");

    session_response(&state, StatusCode::OK, "Logged in", &user)
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = state.tokens().clear_cookie();

    (
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Json(AuthResponse {
            success: true,
            message: "Logged out",
            user: None,
        }),
    )
}

/// POST /auth/google-register
async fn google_register(
    State(state): State<AppState>,
    body: Result<Json<GoogleRegisterRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = body?;

    if missing_fields(&[
        request.email.as_str(),
        request.user_name.as_str(),
        request.google_id.as_str(),
    ]) {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }

    let email = request.email.trim().to_string();
    if User::find_by_email(state.db(), &email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let input = CreateUser {
        user_name: request.user_name.trim().to_string(),
        email,
        password: None,
        google_id: Some(request.google_id),
        profile_picture: request.profile_picture.filter(|p| !p.is_empty()),
        role: Role::User,
    };

    let user = match User::create(state.db(), input).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "user registered via Google");

    session_response(&state, StatusCode::CREATED, "Registered via Google", &user)
}

/// POST /auth/google-login
async fn google_login(
    State(state): State<AppState>,
    body: Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = body?;

    let user = User::find_by_email(state.db(), request.email.trim())
        .await
        .map_err(LoginError::Internal)?
        .filter(|user| user.matches_google_id(&request.google_id))
        .ok_or(LoginError::GoogleMismatch)?;

    info!(user_id = %user.id, "user logged in via Google");

    session_response(&state, StatusCode::OK, "Logged in via Google", &user)
}

/// Identity response for `check-auth`.
#[derive(Debug, Serialize)]
struct CheckAuthResponse {
    success: bool,
    user: UserSummary,
}

/// GET /auth/check-auth
async fn check_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<CheckAuthResponse>> {
    let token = token_from_headers(&headers)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let claims = state
        .tokens()
        .verify(&token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    // The account may have been removed since the token was issued.
    let exists = match claims.user_id() {
        Some(id) => User::find_by_id(state.db(), id).await?.is_some(),
        None => false,
    };
    if !exists {
        return Err(AppError::Unauthorized("Not authenticated".to_string()));
    }

    Ok(Json(CheckAuthResponse {
        success: true,
        user: UserSummary::from(claims),
    }))
}
