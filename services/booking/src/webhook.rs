//! Payment webhook reconciler
//!
//! Applies gateway charge events to the stored payment and appointment and
//! emails both parties about the outcome.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use common::notifications::{Dispatcher, EmailMessage, Outbound};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    gateway::PaymentGateway,
    models::{AppointmentDetails, AppointmentStatus, PaymentStatus},
    repositories::{ScheduleStore, StoreError},
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Check a `t=<unix>,v1=<hex>` signature over `"{t}.{payload}"`
fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> bool {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if (now - timestamp).abs() > tolerance_secs {
        return false;
    }

    signatures.into_iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    })
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
    #[serde(default)]
    failure_message: Option<String>,
}

impl EventObject {
    /// `appointmentId` may be sent as a number or a string
    fn appointment_key(&self) -> Option<String> {
        match self.metadata.get("appointmentId")? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum WebhookOutcome {
    #[serde(rename_all = "camelCase")]
    Applied {
        appointment_id: i64,
        appointment_status: AppointmentStatus,
        payment_status: PaymentStatus,
    },
    /// The slot was taken again before the charge succeeded
    #[serde(rename_all = "camelCase")]
    Refunded {
        appointment_id: i64,
        appointment_status: AppointmentStatus,
        payment_status: PaymentStatus,
        refund_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Ignored { event_type: String },
}

#[derive(Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn ScheduleStore>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: Dispatcher,
    secret: Option<String>,
    tolerance_secs: i64,
}

impl WebhookReconciler {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: Dispatcher,
        secret: Option<String>,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            dispatcher,
            secret: secret.filter(|s| !s.is_empty()),
            tolerance_secs,
        }
    }

    /// Verify, parse and apply one delivery.
    ///
    /// Replays re-apply the same terminal state and re-send the emails.
    #[tracing::instrument(skip_all, fields(component = "webhook", operation = "reconcile"))]
    pub async fn handle(&self, signature: Option<&str>, payload: &[u8]) -> ApiResult<WebhookOutcome> {
        match &self.secret {
            Some(secret) => {
                let verified = signature.is_some_and(|header| {
                    verify_signature(
                        secret,
                        header,
                        payload,
                        Utc::now().timestamp(),
                        self.tolerance_secs,
                    )
                });
                if !verified {
                    warn!("Payment webhook signature verification failed");
                    return Err(ApiError::Unauthorized);
                }
                debug!("Payment webhook signature verified");
            }
            None => warn!("No webhook secret configured, processing unverified payload"),
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {}", e)))?;

        info!(event_id = ?event.id, event_type = %event.kind, "Payment webhook received");

        self.apply(event).await.inspect_err(|e| {
            warn!(error = %e, "Payment webhook not applied");
        })
    }

    async fn apply(&self, event: WebhookEvent) -> ApiResult<WebhookOutcome> {
        let object = &event.data.object;
        let (details, appointment_status, payment_status) = match event.kind.as_str() {
            "charge.succeeded" => (
                self.find_by_metadata(object).await?,
                AppointmentStatus::Confirmed,
                PaymentStatus::Completed,
            ),
            "charge.failed" => (
                self.find_by_metadata(object).await?,
                AppointmentStatus::Cancelled,
                PaymentStatus::Failed,
            ),
            "payment_intent.payment_failed" => (
                self.find_by_gateway_id(object).await?,
                AppointmentStatus::PaymentFailed,
                PaymentStatus::Failed,
            ),
            other => {
                info!(event_type = other, "Unhandled payment event acknowledged");
                return Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                });
            }
        };

        let appointment_id = details.appointment.id;
        let updated = match self
            .store
            .apply_payment_event(appointment_id, appointment_status, payment_status)
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => return Err(ApiError::NotFound("appointment not found".to_string())),
            Err(StoreError::SlotTaken) => return self.refund_released(details, object).await,
            Err(e) => return Err(e.into()),
        };

        info!(
            appointment_id,
            appointment_status = %appointment_status,
            payment_status = %payment_status,
            "Payment event applied"
        );

        let failure = object.failure_message.as_deref();
        self.dispatcher
            .dispatch(outcome_emails(&updated, payment_status, failure))
            .await;

        Ok(WebhookOutcome::Applied {
            appointment_id,
            appointment_status,
            payment_status,
        })
    }

    /// A late success for an appointment whose slot was rebooked after it
    /// was released: the appointment stays released and the charge is
    /// refunded. A failed refund is surfaced so the gateway retries.
    async fn refund_released(
        &self,
        details: AppointmentDetails,
        object: &EventObject,
    ) -> ApiResult<WebhookOutcome> {
        let appointment_id = details.appointment.id;
        let appointment_status = details.appointment.status;
        if details
            .payment
            .as_ref()
            .is_some_and(|p| p.status == PaymentStatus::Canceled)
        {
            info!(appointment_id, "Late charge already refunded");
            return Ok(WebhookOutcome::Applied {
                appointment_id,
                appointment_status,
                payment_status: PaymentStatus::Canceled,
            });
        }

        let charge_id = details
            .payment
            .as_ref()
            .map(|p| p.gateway_id.clone())
            .or_else(|| object.id.clone())
            .ok_or_else(|| ApiError::NotFound("charge not found".to_string()))?;

        let refund = self.gateway.create_refund(&charge_id).await.map_err(|e| {
            error!(appointment_id, charge_id = %charge_id, error = %e, "Refund of late charge failed");
            ApiError::from(e)
        })?;

        let payment_status = PaymentStatus::Canceled;
        let updated = self
            .store
            .apply_payment_event(appointment_id, appointment_status, payment_status)
            .await?
            .ok_or_else(|| ApiError::NotFound("appointment not found".to_string()))?;

        warn!(
            appointment_id,
            charge_id = %charge_id,
            refund_id = %refund.id,
            "Slot was rebooked before the charge succeeded, charge refunded"
        );

        self.dispatcher
            .dispatch(outcome_emails(&updated, payment_status, None))
            .await;

        Ok(WebhookOutcome::Refunded {
            appointment_id,
            appointment_status,
            payment_status,
            refund_id: refund.id,
        })
    }

    /// Resolve `metadata.appointmentId` as a row id or an appointment reference
    async fn find_by_metadata(&self, object: &EventObject) -> ApiResult<AppointmentDetails> {
        let not_found = || ApiError::NotFound("appointment not found".to_string());
        let key = object.appointment_key().ok_or_else(not_found)?;

        let details = if let Ok(id) = key.parse::<i64>() {
            self.store.find_appointment(id).await?
        } else if let Ok(reference) = Uuid::parse_str(&key) {
            self.store.find_appointment_by_reference(reference).await?
        } else {
            None
        };
        details.ok_or_else(not_found)
    }

    async fn find_by_gateway_id(&self, object: &EventObject) -> ApiResult<AppointmentDetails> {
        let not_found = || ApiError::NotFound("appointment not found".to_string());
        let gateway_id = object.id.as_deref().ok_or_else(not_found)?;
        self.store
            .find_appointment_by_gateway_id(gateway_id)
            .await?
            .ok_or_else(not_found)
    }
}

fn outcome_emails(
    details: &AppointmentDetails,
    payment_status: PaymentStatus,
    failure: Option<&str>,
) -> Vec<Outbound> {
    let when = details.appointment.scheduled_at.format("%d/%m/%Y %H:%M");
    let professional = &details.professional;

    let (subject, summary) = match payment_status {
        PaymentStatus::Completed => (
            "Payment confirmed".to_string(),
            format!("The payment for the appointment on {} was confirmed.", when),
        ),
        PaymentStatus::Canceled => (
            "Payment refunded".to_string(),
            format!(
                "The slot on {} was no longer available when the payment went through, so the payment was refunded.",
                when
            ),
        ),
        _ => {
            let reason = failure
                .map(|m| format!(" Reason: {}", m))
                .unwrap_or_default();
            (
                "Payment failed".to_string(),
                format!(
                    "The payment for the appointment on {} failed and the appointment was released.{}",
                    when, reason
                ),
            )
        }
    };

    let mut emails = vec![Outbound::Email(EmailMessage {
        to: professional.email.clone(),
        subject: subject.clone(),
        text: format!("Hello {}, {}", professional.name, summary),
        html: None,
    })];
    if let Some(client) = &details.client {
        emails.push(Outbound::Email(EmailMessage {
            to: client.email.clone(),
            subject,
            text: format!("Hello {}, {}", client.name, summary),
            html: None,
        }));
    }
    emails
}
