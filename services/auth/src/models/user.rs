//! User model and request payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session_hash::Credential;

/// User entity; inactive until the registration is confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user creation payload, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of a [`User`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            active: user.active,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Registration confirmation; either the hash or the code must be present
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub user_id: i64,
    pub hash: Option<String>,
    pub code: Option<String>,
}

impl ConfirmRequest {
    pub fn credential(&self) -> Option<Credential> {
        Credential::from_parts(self.hash.as_deref(), self.code.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub user_id: i64,
    pub hash: Option<String>,
    pub code: Option<String>,
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn credential(&self) -> Option<Credential> {
        Credential::from_parts(self.hash.as_deref(), self.code.as_deref())
    }
}
