//! Stripe-compatible REST gateway

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{Charge, ChargeRequest, GatewayError, GatewayResult, PaymentGateway, Refund};
use crate::models::CardDetails;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

/// Gateway speaking the Stripe `v1` API: form-encoded requests, bearer
/// secret key, JSON responses
#[derive(Clone)]
pub struct StripeGateway {
    api_base: String,
    secret_key: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str, client: reqwest::Client) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: Response) -> GatewayResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }
}

/// Classify an error response; card errors and HTTP 402 are declines
fn error_from_body(status: StatusCode, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let kind = parsed.as_ref().and_then(|e| e.error.kind.clone());
    let message = parsed
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| format!("gateway returned {}", status));

    if status == StatusCode::PAYMENT_REQUIRED || kind.as_deref() == Some("card_error") {
        GatewayError::Declined(message)
    } else {
        GatewayError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn tokenize_card(&self, card: &CardDetails) -> GatewayResult<String> {
        let mut form = vec![
            ("card[number]", card.number.replace(' ', "")),
            ("card[exp_month]", card.exp_month.to_string()),
            ("card[exp_year]", card.exp_year.to_string()),
            ("card[cvc]", card.cvc.clone()),
        ];
        if let Some(name) = &card.holder_name {
            form.push(("card[name]", name.clone()));
        }

        let response = self
            .client
            .post(self.url("tokens"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let token: Token = Self::read(response).await?;
        Ok(token.id)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<Charge> {
        let mut form = vec![
            ("amount".to_string(), request.amount_cents.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("source".to_string(), request.source.clone()),
            ("description".to_string(), request.description.clone()),
        ];
        form.extend(
            request
                .metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{}]", k), v.clone())),
        );

        let response = self
            .client
            .post(self.url("charges"))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await?;

        let charge: Charge = Self::read(response).await?;
        debug!(charge_id = %charge.id, status = ?charge.status, "Charge created");
        Ok(charge)
    }

    async fn create_refund(&self, charge_id: &str) -> GatewayResult<Refund> {
        let response = self
            .client
            .post(self.url("refunds"))
            .bearer_auth(&self.secret_key)
            .form(&[("charge", charge_id)])
            .send()
            .await?;

        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChargeStatus;

    #[test]
    fn test_card_error_is_a_decline() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        match error_from_body(StatusCode::BAD_REQUEST, body) {
            GatewayError::Declined(msg) => assert_eq!(msg, "Your card was declined."),
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[test]
    fn test_payment_required_without_body_is_a_decline() {
        assert!(matches!(
            error_from_body(StatusCode::PAYMENT_REQUIRED, ""),
            GatewayError::Declined(_)
        ));
    }

    #[test]
    fn test_server_error_is_not_a_decline() {
        let body = r#"{"error":{"type":"api_error","message":"Something went wrong"}}"#;
        match error_from_body(StatusCode::INTERNAL_SERVER_ERROR, body) {
            GatewayError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Something went wrong");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_charge_parses_from_gateway_json() {
        let charge: Charge = serde_json::from_str(
            r#"{"id":"ch_1","object":"charge","status":"succeeded","amount":5000}"#,
        )
        .unwrap();
        assert_eq!(charge.id, "ch_1");
        assert_eq!(charge.status, ChargeStatus::Succeeded);
        assert_eq!(charge.failure_message, None);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let gateway = StripeGateway::new("http://localhost:12111/", "sk_test", reqwest::Client::new());
        assert_eq!(gateway.url("charges"), "http://localhost:12111/v1/charges");
    }
}
