//! SMS delivery over a Twilio-compatible REST API

use serde::Deserialize;

use super::{NotificationError, NotificationResult, SmsMessage};

/// SMS provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub api_base: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twilio.com/2010-04-01".to_string(),
            account_sid: None,
            auth_token: None,
            from_number: None,
        }
    }
}

impl SmsConfig {
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

pub struct SmsClient {
    config: SmsConfig,
    http: reqwest::Client,
}

impl SmsClient {
    pub fn new(config: SmsConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Form-encoded `Messages.json` request for `message`
    fn build_request(&self, message: &SmsMessage) -> NotificationResult<reqwest::Request> {
        let (Some(sid), Some(token), Some(from)) = (
            self.config.account_sid.as_deref(),
            self.config.auth_token.as_deref(),
            self.config.from_number.as_deref(),
        ) else {
            return Err(NotificationError::Sms("SMS provider not configured".to_string()));
        };

        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            sid
        );

        Ok(self
            .http
            .post(url)
            .basic_auth(sid, Some(token))
            .form(&[
                ("To", message.to.as_str()),
                ("From", from),
                ("Body", message.body.as_str()),
            ])
            .build()?)
    }

    pub async fn send(&self, message: &SmsMessage) -> NotificationResult<()> {
        let request = self.build_request(message)?;
        let response = self.http.execute(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Sms(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}
