//! Session hash issuer and validator
//!
//! A session hash pairs a SHA-256 hex token (sent as a link) with a
//! six-digit code (typed by hand). Either one, presented back once before
//! expiry, authorizes its action.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    models::{Credential, NewSessionHash, SessionAction, SessionHash},
    password::hash_password,
    repositories::CredentialStore,
};

pub const DEFAULT_TTL_MINUTES: i64 = 60;

fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

fn generate_hash(user_id: i64, issued_at: DateTime<Utc>) -> String {
    let mut buffer = [0u8; 32];
    OsRng.fill_bytes(&mut buffer);

    let mut hasher = Sha256::new();
    hasher.update(buffer);
    hasher.update(format!(":{}:{}", user_id, issued_at.timestamp_millis()).as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct SessionHashService {
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
}

impl SessionHashService {
    pub fn new(store: Arc<dyn CredentialStore>, ttl_minutes: i64) -> Self {
        Self {
            store,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Hand out the user's usable hash for `action`, creating one if needed.
    ///
    /// Expired hashes of every user are purged first.
    #[tracing::instrument(skip(self), fields(component = "session_hash", operation = "issue"))]
    pub async fn issue(&self, user_id: i64, action: SessionAction) -> AuthResult<SessionHash> {
        let now = Utc::now();
        let purged = self.store.purge_expired_hashes(now).await?;
        if purged > 0 {
            debug!(purged, "Expired session hashes removed");
        }

        if let Some(existing) = self.store.find_active_hash(user_id, action, now).await? {
            debug!(hash_id = existing.id, "Reusing active session hash");
            return Ok(existing);
        }

        let issued = self
            .store
            .insert_hash(&NewSessionHash {
                user_id,
                hash: generate_hash(user_id, now),
                code: generate_code(),
                action,
                expires_at: now + self.ttl,
            })
            .await?;

        info!(hash_id = issued.id, expires_at = %issued.expires_at, "Session hash issued");
        Ok(issued)
    }

    /// Consume a hash and apply its action.
    ///
    /// `new_password` is required for [`SessionAction::ResetPassword`]. An
    /// expired hash is rejected like a missing one.
    #[tracing::instrument(
        skip(self, credential, new_password),
        fields(component = "session_hash", operation = "validate")
    )]
    pub async fn validate(
        &self,
        user_id: i64,
        action: SessionAction,
        credential: &Credential,
        new_password: Option<&str>,
    ) -> AuthResult<()> {
        let password_hash = match (action, new_password) {
            (SessionAction::ResetPassword, Some(password)) => Some(hash_password(password)?),
            (SessionAction::ResetPassword, None) => {
                return Err(AuthError::BadRequest("a new password is required".to_string()));
            }
            (SessionAction::ConfirmRegister, _) => None,
        };

        let not_found = || AuthError::NotFound("invalid or expired session hash".to_string());
        let Some(stored) = self
            .store
            .find_hash_by_credential(user_id, action, credential, Utc::now())
            .await?
        else {
            warn!("No usable session hash matched");
            return Err(not_found());
        };

        if !self.store.consume_hash(stored.id).await? {
            warn!(hash_id = stored.id, "Session hash consumed concurrently");
            return Err(not_found());
        }

        match action {
            SessionAction::ConfirmRegister => self.store.activate_user(user_id).await?,
            SessionAction::ResetPassword => {
                if let Some(hash) = password_hash {
                    self.store.set_password_hash(user_id, &hash).await?;
                }
            }
        }

        info!(hash_id = stored.id, "Session hash consumed");
        Ok(())
    }
}
