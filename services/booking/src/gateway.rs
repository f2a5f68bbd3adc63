//! Card payment gateway seam

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{CardDetails, PaymentStatus};

pub mod stripe;

pub use stripe::StripeGateway;

/// Errors raised by a [`PaymentGateway`]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway refused the card or the charge
    #[error("{0}")]
    Declined(String),

    /// The gateway answered with an error that is not a decline
    #[error("gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Charge as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
}

impl From<ChargeStatus> for PaymentStatus {
    fn from(status: ChargeStatus) -> Self {
        match status {
            ChargeStatus::Succeeded => PaymentStatus::Succeeded,
            ChargeStatus::Pending => PaymentStatus::Pending,
            ChargeStatus::Failed => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_cents: i64,
    pub currency: String,
    /// Token returned by [`PaymentGateway::tokenize_card`]
    pub source: String,
    pub description: String,
    /// Sent as the `Idempotency-Key` header
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Charge {
    pub id: String,
    pub status: ChargeStatus,
    #[serde(default)]
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Exchange raw card data for a single-use token
    async fn tokenize_card(&self, card: &CardDetails) -> GatewayResult<String>;

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<Charge>;

    /// Refund a charge in full
    async fn create_refund(&self, charge_id: &str) -> GatewayResult<Refund>;
}
