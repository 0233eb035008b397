use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, PgPool};
use uuid::Uuid;

use super::CredentialStore;
use crate::error::AppError;
use crate::models::{normalize_email, ApprovalStatus, NewUser, User};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('client', 'admin', 'collaborator')),
    approval_status TEXT NOT NULL CHECK (approval_status IN ('pending', 'approved', 'rejected')),
    rejection_reason TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    email_verified BOOLEAN NOT NULL DEFAULT FALSE,
    permissions TEXT[] NOT NULL DEFAULT '{}',
    phone TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (LOWER(email));
"#;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, approval_status, rejection_reason, \
     is_active, email_verified, permissions, phone, created_at, updated_at";

/// Row shape of the `users` table. Role and status are stored as checked TEXT.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    approval_status: String,
    rejection_reason: Option<String>,
    is_active: bool,
    email_verified: bool,
    permissions: Vec<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(AppError::DatabaseError)?,
            approval_status: row
                .approval_status
                .parse()
                .map_err(AppError::DatabaseError)?,
            rejection_reason: row.rejection_reason,
            is_active: row.is_active,
            email_verified: row.email_verified,
            permissions: row.permissions,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `users` table and its case-insensitive email index when missing.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        (&self.pool).execute(SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let user = user.into_user();
        let sql = format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            USER_COLUMNS, USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.approval_status.as_str())
            .bind(&user.rejection_reason)
            .bind(user.is_active)
            .bind(user.email_verified)
            .bind(&user.permissions)
            .bind(&user.phone)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await?;
        User::try_from(row)
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET name = $2, email = $3, password_hash = $4, role = $5, \
             approval_status = $6, rejection_reason = $7, is_active = $8, email_verified = $9, \
             permissions = $10, phone = $11, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(normalize_email(&user.email))
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.approval_status.as_str())
            .bind(&user.rejection_reason)
            .bind(user.is_active)
            .bind(user.email_verified)
            .bind(&user.permissions)
            .bind(&user.phone)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        User::try_from(row)
    }

    async fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE approval_status = $1 AND role <> 'admin' \
             ORDER BY created_at",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}
