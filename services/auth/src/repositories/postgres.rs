//! PostgreSQL-backed [`CredentialStore`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::{CredentialStore, StoreError, StoreResult};
use crate::models::{Credential, NewSessionHash, NewUser, SessionAction, SessionHash, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, active, created_at, updated_at";
const HASH_COLUMNS: &str = "id, user_id, hash, code, action, status, expires_at, created_at";

/// Credential store over a shared connection pool
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn hash_from_row(row: &PgRow) -> StoreResult<SessionHash> {
    let action: String = row.try_get("action")?;
    Ok(SessionHash {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        hash: row.try_get("hash")?,
        code: row.try_get("code")?,
        action: action.parse().map_err(StoreError::InvalidRow)?,
        status: row.try_get("status")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", user.email);

        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                StoreError::Duplicate(format!("user email {}", user.email))
            } else {
                StoreError::Database(e)
            }
        })?;

        user_from_row(&row)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn activate_user(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE users SET active = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired_hashes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM session_hashes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_active_hash(
        &self,
        user_id: i64,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionHash>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM session_hashes \
             WHERE user_id = $1 AND action = $2 AND status AND expires_at > $3 \
             ORDER BY created_at DESC LIMIT 1",
            HASH_COLUMNS
        ))
        .bind(user_id)
        .bind(action.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(hash_from_row).transpose()
    }

    async fn find_hash_by_credential(
        &self,
        user_id: i64,
        action: SessionAction,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionHash>> {
        let (column, value) = match credential {
            Credential::Hash(hash) => ("hash", hash),
            Credential::Code(code) => ("code", code),
        };

        let row = sqlx::query(&format!(
            "SELECT {} FROM session_hashes \
             WHERE user_id = $1 AND action = $2 AND {} = $3 AND status AND expires_at > $4 \
             ORDER BY created_at DESC LIMIT 1",
            HASH_COLUMNS, column
        ))
        .bind(user_id)
        .bind(action.as_str())
        .bind(value)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(hash_from_row).transpose()
    }

    async fn insert_hash(&self, hash: &NewSessionHash) -> StoreResult<SessionHash> {
        let row = sqlx::query(&format!(
            "INSERT INTO session_hashes (user_id, hash, code, action, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            HASH_COLUMNS
        ))
        .bind(hash.user_id)
        .bind(&hash.hash)
        .bind(&hash.code)
        .bind(hash.action.as_str())
        .bind(hash.expires_at)
        .fetch_one(&self.pool)
        .await?;

        hash_from_row(&row)
    }

    async fn consume_hash(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE session_hashes SET status = FALSE WHERE id = $1 AND status")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
