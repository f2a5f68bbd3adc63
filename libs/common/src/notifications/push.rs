//! Push delivery over an Expo-style JSON push API

use serde::Deserialize;

use super::{NotificationError, NotificationResult, PushMessage};

/// Push provider settings; delivery is off until `endpoint` is set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// e.g. `https://exp.host/--/api/v2/push/send`
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
}

impl PushConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.is_empty())
    }
}

pub struct PushClient {
    config: PushConfig,
    http: reqwest::Client,
}

impl PushClient {
    pub fn new(config: PushConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// JSON request carrying `to`, `title`, `body` and `data`
    fn build_request(&self, message: &PushMessage) -> NotificationResult<reqwest::Request> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| NotificationError::Push("push endpoint not configured".to_string()))?;

        let mut request = self.http.post(endpoint).json(message);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        Ok(request.build()?)
    }

    pub async fn send(&self, message: &PushMessage) -> NotificationResult<()> {
        let request = self.build_request(message)?;
        let response = self.http.execute(request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Push(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}
