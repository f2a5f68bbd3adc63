//! Attempt limiter for session hash confirmation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimiterConfig {
    /// Attempts allowed inside one window
    pub max_attempts: u32,
    pub window_seconds: u64,
    /// How long a key stays blocked once it exceeds the limit
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            ban_duration_seconds: 3600,
        }
    }
}

#[derive(Debug)]
struct Attempts {
    count: u32,
    window_start: Instant,
    banned_until: Option<Instant>,
}

impl Attempts {
    /// Window over and no ban pending
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        self.banned_until.is_none_or(|until| now >= until)
            && now.duration_since(self.window_start) >= window
    }
}

/// Fixed-window attempt counter with a ban once the window overflows
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Attempts>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key`; false while the key is over the limit
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let window = Duration::from_secs(self.config.window_seconds);
        let mut entries = self.entries.lock().await;
        entries.retain(|_, attempts| !attempts.is_stale(now, window));

        let entry = entries.entry(key.to_string()).or_insert(Attempts {
            count: 0,
            window_start: now,
            banned_until: None,
        });

        match entry.banned_until {
            Some(until) if now < until => return false,
            Some(_) => {
                entry.banned_until = None;
                entry.count = 0;
                entry.window_start = now;
            }
            None => {}
        }

        if now.duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_attempts {
            entry.banned_until = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                key,
                ban_seconds = self.config.ban_duration_seconds,
                "Attempt limit exceeded, key banned"
            );
            return false;
        }

        entry.count += 1;
        true
    }

    /// Forget `key`, e.g. after a successful confirmation
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
