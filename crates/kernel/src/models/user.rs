//! User model and CRUD operations.

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::role::Role;

const USER_COLUMNS: &str =
    "id, user_name, pass, email, google_id, profile_picture, role, created_at";

/// User record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    /// Argon2 hash; empty for accounts created through Google.
    #[serde(skip_serializing)]
    pub pass: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Database row for user.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    user_name: String,
    pass: String,
    email: String,
    google_id: Option<String>,
    profile_picture: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            user_name: row.user_name,
            pass: row.pass,
            email: row.email,
            google_id: row.google_id,
            profile_picture: row.profile_picture,
            role: Role::from(row.role.as_str()),
            created_at: row.created_at,
        }
    }
}

/// Input for creating a new user.
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub user_name: String,
    pub email: String,
    /// Plain-text password; `None` for Google accounts.
    pub password: Option<String>,
    pub google_id: Option<String>,
    pub profile_picture: Option<String>,
    pub role: Role,
}

impl User {
    /// Find a user by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by id")?;

        Ok(row.map(User::from))
    }

    /// Find a user by email.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

        Ok(row.map(User::from))
    }

    /// Find a user by user name.
    pub async fn find_by_user_name(pool: &PgPool, user_name: &str) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_name = $1"
        ))
        .bind(user_name)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by user name")?;

        Ok(row.map(User::from))
    }

    /// Create a new user.
    pub async fn create(pool: &PgPool, input: CreateUser) -> Result<Self> {
        let id = Uuid::now_v7();
        let pass = match &input.password {
            Some(password) => hash_password(password)?,
            None => String::new(),
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, user_name, pass, email, google_id, profile_picture, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.user_name)
        .bind(&pass)
        .bind(&input.email)
        .bind(&input.google_id)
        .bind(&input.profile_picture)
        .bind(input.role.as_str())
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        Ok(row.into())
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.pass.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.pass) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Whether this account is linked to the given Google account id.
    pub fn matches_google_id(&self, google_id: &str) -> bool {
        !google_id.is_empty() && self.google_id.as_deref() == Some(google_id)
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
