//! SMTP email delivery

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::Deserialize;

use super::{EmailMessage, NotificationError, NotificationResult};

/// SMTP settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_tls: true,
            from_address: None,
            from_name: "Barbershop".to_string(),
        }
    }
}

impl EmailConfig {
    /// Host and sender address are the minimum needed to send
    pub fn is_configured(&self) -> bool {
        self.smtp_host.as_deref().is_some_and(|h| !h.is_empty())
            && self.from_address.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Sends [`EmailMessage`]s through an SMTP relay
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn send(&self, message: &EmailMessage) -> NotificationResult<()> {
        let email = self.build(message)?;

        let smtp_host = self
            .config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Email("SMTP host not configured".to_string()))?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
                .map_err(|e| NotificationError::Email(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer
            .build()
            .send(email)
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;

        Ok(())
    }

    fn build(&self, message: &EmailMessage) -> NotificationResult<Message> {
        let from_address = self
            .config
            .from_address
            .as_deref()
            .ok_or_else(|| NotificationError::Email("From address not configured".to_string()))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address)
            .parse()
            .map_err(|e| NotificationError::Email(format!("invalid sender: {}", e)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| NotificationError::Email(format!("invalid recipient: {}", e)))?;

        let builder = Message::builder().from(from).to(to).subject(&message.subject);

        let email = match &message.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                html.clone(),
            )),
            None => builder.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(message.text.clone()),
            ),
        };

        email.map_err(|e| NotificationError::Email(e.to_string()))
    }
}
