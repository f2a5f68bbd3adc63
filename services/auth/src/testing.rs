//! Fakes shared by the unit tests

use std::sync::Arc;

use async_trait::async_trait;
use common::notifications::{
    Dispatcher, EmailMessage, NotificationResult, Notifier, PushMessage, SmsMessage,
};
use tokio::sync::Mutex;

use crate::{
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::memory::InMemoryCredentialStore,
    session_hash::{DEFAULT_TTL_MINUTES, SessionHashService},
    state::AppState,
};

/// Keeps every email; other channels are unused by this service
#[derive(Default)]
pub struct Mailbox {
    pub emails: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Notifier for Mailbox {
    async fn send_email(&self, message: &EmailMessage) -> NotificationResult<()> {
        self.emails.lock().await.push(message.clone());
        Ok(())
    }

    async fn send_sms(&self, _message: &SmsMessage) -> NotificationResult<()> {
        Ok(())
    }

    async fn send_push(&self, _message: &PushMessage) -> NotificationResult<()> {
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryCredentialStore>,
    pub mailbox: Arc<Mailbox>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryCredentialStore::new());
        let mailbox = Arc::new(Mailbox::default());

        let state = AppState {
            store: store.clone(),
            session_hashes: SessionHashService::new(store.clone(), DEFAULT_TTL_MINUTES),
            rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
            dispatcher: Dispatcher::new(mailbox.clone(), false),
        };

        Self {
            store,
            mailbox,
            state,
        }
    }
}
