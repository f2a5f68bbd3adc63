//! Persistence for users and session hashes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Credential, NewSessionHash, NewUser, SessionAction, SessionHash, User};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgCredentialStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The email is already registered
    #[error("duplicate value: {0}")]
    Duplicate(String),

    #[error("stored value is invalid: {0}")]
    InvalidRow(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn activate_user(&self, id: i64) -> StoreResult<()>;
    async fn set_password_hash(&self, id: i64, password_hash: &str) -> StoreResult<()>;

    /// Deletes every hash whose expiry is not after `now`; returns how many
    async fn purge_expired_hashes(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// The active, unexpired hash of `user_id` for `action`, if any
    async fn find_active_hash(
        &self,
        user_id: i64,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionHash>>;

    /// Like [`find_active_hash`](Self::find_active_hash), restricted to the
    /// hash matching `credential`
    async fn find_hash_by_credential(
        &self,
        user_id: i64,
        action: SessionAction,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionHash>>;

    async fn insert_hash(&self, hash: &NewSessionHash) -> StoreResult<SessionHash>;

    /// Flips `status` from true to false; false when it was already consumed
    async fn consume_hash(&self, id: i64) -> StoreResult<bool>;
}
