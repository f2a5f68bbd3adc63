//! Client model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country_code: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn phone_number(&self) -> String {
        format!("{}{}", self.country_code, self.phone)
    }
}

/// Contact details supplied with a booking
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country_code: String,
}

impl ClientContact {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("client name is required".to_string());
        }
        if !self.email.contains('@') {
            return Err("a valid client email is required".to_string());
        }
        if self.phone.trim().is_empty() || self.country_code.trim().is_empty() {
            return Err("client phone and country code are required".to_string());
        }
        Ok(())
    }

    /// Emails are matched case-insensitively
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}
