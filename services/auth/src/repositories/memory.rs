//! In-memory [`CredentialStore`] used by the unit tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CredentialStore, StoreError, StoreResult};
use crate::models::{Credential, NewSessionHash, NewUser, SessionAction, SessionHash, User};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    hashes: Vec<SessionHash>,
    next_hash_id: i64,
}

#[derive(Default, Clone)]
pub struct InMemoryCredentialStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored hash, consumed ones included
    pub async fn hashes(&self) -> Vec<SessionHash> {
        self.tables.read().await.hashes.clone()
    }

    /// Move a hash's expiry, e.g. into the past
    pub async fn set_hash_expiry(&self, id: i64, expires_at: DateTime<Utc>) {
        let mut tables = self.tables.write().await;
        if let Some(hash) = tables.hashes.iter_mut().find(|h| h.id == id) {
            hash.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("user email {}", user.email)));
        }

        let now = Utc::now();
        let created = User {
            id: tables.users.len() as i64 + 1,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            active: false,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn activate_user(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.active = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn purge_expired_hashes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.hashes.len();
        tables.hashes.retain(|h| h.expires_at > now);
        Ok((before - tables.hashes.len()) as u64)
    }

    async fn find_active_hash(
        &self,
        user_id: i64,
        action: SessionAction,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionHash>> {
        let tables = self.tables.read().await;
        Ok(tables
            .hashes
            .iter()
            .rev()
            .find(|h| h.user_id == user_id && h.action == action && h.is_usable(now))
            .cloned())
    }

    async fn find_hash_by_credential(
        &self,
        user_id: i64,
        action: SessionAction,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<SessionHash>> {
        let tables = self.tables.read().await;
        Ok(tables
            .hashes
            .iter()
            .rev()
            .find(|h| {
                h.user_id == user_id
                    && h.action == action
                    && h.is_usable(now)
                    && h.matches(credential)
            })
            .cloned())
    }

    async fn insert_hash(&self, hash: &NewSessionHash) -> StoreResult<SessionHash> {
        let mut tables = self.tables.write().await;
        tables.next_hash_id += 1;
        let stored = SessionHash {
            id: tables.next_hash_id,
            user_id: hash.user_id,
            hash: hash.hash.clone(),
            code: hash.code.clone(),
            action: hash.action,
            status: true,
            expires_at: hash.expires_at,
            created_at: Utc::now(),
        };
        tables.hashes.push(stored.clone());
        Ok(stored)
    }

    async fn consume_hash(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.hashes.iter_mut().find(|h| h.id == id && h.status) {
            Some(hash) => {
                hash.status = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
