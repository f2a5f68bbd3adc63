//! Auth service settings, read from `AUTH__*` environment variables over
//! built-in defaults

use common::notifications::EmailConfig;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::{rate_limiter::RateLimiterConfig, session_hash::DEFAULT_TTL_MINUTES};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub rate_limit: RateLimiterConfig,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Lifetime of an issued session hash
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    pub detached: bool,
    #[serde(default)]
    pub email: EmailConfig,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let limits = RateLimiterConfig::default();
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("session.ttl_minutes", DEFAULT_TTL_MINUTES)?
            .set_default("rate_limit.max_attempts", i64::from(limits.max_attempts))?
            .set_default("rate_limit.window_seconds", limits.window_seconds as i64)?
            .set_default("rate_limit.ban_duration_seconds", limits.ban_duration_seconds as i64)?
            .set_default("notifications.detached", true)?
            .add_source(Environment::with_prefix("AUTH").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
