//! Booking service settings
//!
//! Defaults are layered under environment variables prefixed with
//! `BOOKING`, nested keys separated by `__`
//! (e.g. `BOOKING__PAYMENT__SECRET_KEY`).

use common::notifications::{EmailConfig, PushConfig, SmsConfig};
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::gateway::stripe::DEFAULT_API_BASE;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub payment: PaymentSettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSettings {
    pub api_base: String,
    pub secret_key: String,
    /// Enables `Stripe-Signature` verification on the webhook
    #[serde(default)]
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    /// ISO 4217, lowercase
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    /// Spawn deliveries instead of awaiting them inside the request
    pub detached: bool,
    #[serde(default)]
    pub admin_push_target: Option<String>,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub push: PushConfig,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3002)?
            .set_default("payment.api_base", DEFAULT_API_BASE)?
            .set_default("payment.secret_key", "")?
            .set_default("payment.webhook_tolerance_secs", 300)?
            .set_default("payment.currency", "brl")?
            .set_default("notifications.detached", true)?
            .add_source(Environment::with_prefix("BOOKING").separator("__"))
            .build()?
            .try_deserialize()
    }
}
