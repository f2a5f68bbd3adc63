//! Outbound notifications: email, SMS and push
//!
//! Delivery is at-most-once and best-effort. Callers hand a batch of
//! [`Outbound`] messages to a [`Dispatcher`], which either awaits them inline
//! or detaches them onto the runtime; delivery failures are logged and never
//! reach the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod email;
pub mod push;
pub mod sms;

pub use email::{EmailConfig, SmtpMailer};
pub use push::{PushClient, PushConfig};
pub use sms::{SmsClient, SmsConfig};

/// Errors raised by a notification channel
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("SMS delivery failed: {0}")]
    Sms(String),

    #[error("Push delivery failed: {0}")]
    Push(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type NotificationResult<T> = Result<T, NotificationError>;

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// A text message; `to` carries the country code (E.164)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// A push notification addressed to a device or user target id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    #[serde(rename = "to")]
    pub target: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// One message on any channel
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Email(EmailMessage),
    Sms(SmsMessage),
    Push(PushMessage),
}

impl Outbound {
    pub fn channel(&self) -> &'static str {
        match self {
            Outbound::Email(_) => "email",
            Outbound::Sms(_) => "sms",
            Outbound::Push(_) => "push",
        }
    }
}

/// Something able to deliver messages on each channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> NotificationResult<()>;
    async fn send_sms(&self, message: &SmsMessage) -> NotificationResult<()>;
    async fn send_push(&self, message: &PushMessage) -> NotificationResult<()>;
}

/// Notifier backed by SMTP, an SMS REST API and a push REST API.
///
/// Channels without configuration are skipped with a warning.
pub struct ChannelNotifier {
    email: SmtpMailer,
    sms: SmsClient,
    push: PushClient,
}

impl ChannelNotifier {
    pub fn new(email: EmailConfig, sms: SmsConfig, push: PushConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            email: SmtpMailer::new(email),
            sms: SmsClient::new(sms, http.clone()),
            push: PushClient::new(push, http),
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_email(&self, message: &EmailMessage) -> NotificationResult<()> {
        if !self.email.is_enabled() {
            warn!("Email not configured, skipping email to {}", message.to);
            return Ok(());
        }
        self.email.send(message).await
    }

    async fn send_sms(&self, message: &SmsMessage) -> NotificationResult<()> {
        if !self.sms.is_enabled() {
            warn!("SMS not configured, skipping SMS to {}", message.to);
            return Ok(());
        }
        self.sms.send(message).await
    }

    async fn send_push(&self, message: &PushMessage) -> NotificationResult<()> {
        if !self.push.is_enabled() {
            warn!("Push not configured, skipping push to {}", message.target);
            return Ok(());
        }
        self.push.send(message).await
    }
}

/// Hands batches of messages to a [`Notifier`]
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    detached: bool,
}

impl Dispatcher {
    /// `detached` spawns each batch onto the runtime instead of awaiting it
    pub fn new(notifier: Arc<dyn Notifier>, detached: bool) -> Self {
        Self { notifier, detached }
    }

    pub async fn dispatch(&self, batch: Vec<Outbound>) {
        if batch.is_empty() {
            return;
        }

        if self.detached {
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                deliver(notifier.as_ref(), batch).await;
            });
        } else {
            deliver(self.notifier.as_ref(), batch).await;
        }
    }
}

async fn deliver(notifier: &dyn Notifier, batch: Vec<Outbound>) {
    for message in batch {
        let channel = message.channel();
        let result = match &message {
            Outbound::Email(email) => notifier.send_email(email).await,
            Outbound::Sms(sms) => notifier.send_sms(sms).await,
            Outbound::Push(push) => notifier.send_push(push).await,
        };

        match result {
            Ok(()) => debug!(channel, "Notification delivered"),
            Err(e) => warn!(channel, error = %e, "Notification delivery failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<&'static str>>,
        fail_sms: bool,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send_email(&self, _message: &EmailMessage) -> NotificationResult<()> {
            self.sent.lock().await.push("email");
            Ok(())
        }

        async fn send_sms(&self, _message: &SmsMessage) -> NotificationResult<()> {
            if self.fail_sms {
                return Err(NotificationError::Sms("provider down".to_string()));
            }
            self.sent.lock().await.push("sms");
            Ok(())
        }

        async fn send_push(&self, _message: &PushMessage) -> NotificationResult<()> {
            self.sent.lock().await.push("push");
            Ok(())
        }
    }

    fn batch() -> Vec<Outbound> {
        vec![
            Outbound::Push(PushMessage {
                target: "device-1".to_string(),
                title: "New booking".to_string(),
                body: "Saturday 10:00".to_string(),
                data: serde_json::json!({ "appointmentId": 1 }),
            }),
            Outbound::Sms(SmsMessage {
                to: "+5511999990000".to_string(),
                body: "Booked".to_string(),
            }),
            Outbound::Email(EmailMessage {
                to: "client@example.com".to_string(),
                subject: "Booked".to_string(),
                text: "See you soon".to_string(),
                html: None,
            }),
        ]
    }

    #[tokio::test]
    async fn test_inline_dispatch_continues_after_failure() {
        let recorder = Arc::new(Recorder {
            fail_sms: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(recorder.clone(), false);

        dispatcher.dispatch(batch()).await;

        assert_eq!(*recorder.sent.lock().await, vec!["push", "email"]);
    }

    #[tokio::test]
    async fn test_detached_dispatch_delivers_in_background() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), true);

        dispatcher.dispatch(batch()).await;

        for _ in 0..100 {
            if recorder.sent.lock().await.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*recorder.sent.lock().await, vec!["push", "sms", "email"]);
    }

    #[tokio::test]
    async fn test_unconfigured_channels_are_skipped() {
        let notifier = ChannelNotifier::new(
            EmailConfig::default(),
            SmsConfig::default(),
            PushConfig::default(),
        );

        for message in batch() {
            let result = match &message {
                Outbound::Email(m) => notifier.send_email(m).await,
                Outbound::Sms(m) => notifier.send_sms(m).await,
                Outbound::Push(m) => notifier.send_push(m).await,
            };
            assert!(result.is_ok(), "{} should be skipped", message.channel());
        }
    }
}
