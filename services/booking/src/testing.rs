//! Fakes and fixtures shared by the unit tests

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;
use common::notifications::{
    Dispatcher, EmailMessage, NotificationError, NotificationResult, Notifier, Outbound,
    PushMessage, SmsMessage,
};
use tokio::sync::Mutex;

use crate::{
    booking::BookingService,
    gateway::{
        Charge, ChargeRequest, ChargeStatus, GatewayError, GatewayResult, PaymentGateway, Refund,
    },
    models::{
        CardDetails, ClientContact, CreateBookingRequest, NewProfessional, NewService,
        Professional, WorkingHours,
    },
    repositories::{ScheduleStore, memory::InMemoryScheduleStore},
    webhook::WebhookReconciler,
};

/// How the fake gateway answers charges
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    Succeed,
    Pending,
    Decline(String),
    Outage,
}

pub struct FakeGateway {
    outcome: Mutex<ChargeOutcome>,
    pub charges: Mutex<Vec<ChargeRequest>>,
    pub refunds: Mutex<Vec<String>>,
    refund_outage: Mutex<bool>,
}

impl FakeGateway {
    pub fn new(outcome: ChargeOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            charges: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
            refund_outage: Mutex::new(false),
        }
    }

    pub async fn set_outcome(&self, outcome: ChargeOutcome) {
        *self.outcome.lock().await = outcome;
    }

    pub async fn set_refund_outage(&self, outage: bool) {
        *self.refund_outage.lock().await = outage;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn tokenize_card(&self, card: &CardDetails) -> GatewayResult<String> {
        let digits: String = card.number.chars().filter(char::is_ascii_digit).collect();
        Ok(format!("tok_{}", &digits[digits.len().saturating_sub(4)..]))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> GatewayResult<Charge> {
        let outcome = self.outcome.lock().await.clone();
        let mut charges = self.charges.lock().await;
        charges.push(request.clone());
        let id = format!("ch_{}", charges.len());

        match outcome {
            ChargeOutcome::Succeed => Ok(Charge {
                id,
                status: ChargeStatus::Succeeded,
                failure_message: None,
            }),
            ChargeOutcome::Pending => Ok(Charge {
                id,
                status: ChargeStatus::Pending,
                failure_message: None,
            }),
            ChargeOutcome::Decline(message) => Err(GatewayError::Declined(message)),
            ChargeOutcome::Outage => Err(GatewayError::Api {
                status: 500,
                message: "gateway unavailable".to_string(),
            }),
        }
    }

    async fn create_refund(&self, charge_id: &str) -> GatewayResult<Refund> {
        if *self.refund_outage.lock().await {
            return Err(GatewayError::Api {
                status: 500,
                message: "gateway unavailable".to_string(),
            });
        }
        self.refunds.lock().await.push(charge_id.to_string());
        Ok(Refund {
            id: format!("re_{}", charge_id),
            status: "succeeded".to_string(),
        })
    }
}

/// Notifier that records every message; optionally fails every send
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Outbound>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub async fn channels(&self) -> Vec<&'static str> {
        self.sent.lock().await.iter().map(Outbound::channel).collect()
    }

    pub async fn emails(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|m| match m {
                Outbound::Email(email) => Some(email.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, message: Outbound) -> NotificationResult<()> {
        if self.fail {
            return Err(NotificationError::Email("recorder set to fail".to_string()));
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, message: &EmailMessage) -> NotificationResult<()> {
        self.record(Outbound::Email(message.clone())).await
    }

    async fn send_sms(&self, message: &SmsMessage) -> NotificationResult<()> {
        self.record(Outbound::Sms(message.clone())).await
    }

    async fn send_push(&self, message: &PushMessage) -> NotificationResult<()> {
        self.record(Outbound::Push(message.clone())).await
    }
}

/// Everything a workflow test needs, wired with inline notification delivery
pub struct Harness {
    pub store: Arc<InMemoryScheduleStore>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub booking: BookingService,
    pub reconciler: WebhookReconciler,
}

impl Harness {
    pub fn new(outcome: ChargeOutcome) -> Self {
        Self::with_notifier(outcome, RecordingNotifier::default())
    }

    pub fn with_notifier(outcome: ChargeOutcome, notifier: RecordingNotifier) -> Self {
        let store = Arc::new(InMemoryScheduleStore::new());
        let gateway = Arc::new(FakeGateway::new(outcome));
        let notifier = Arc::new(notifier);
        let dispatcher = Dispatcher::new(notifier.clone(), false);

        let booking = BookingService::new(
            store.clone(),
            gateway.clone(),
            dispatcher.clone(),
            "brl",
            Some("admin-device".to_string()),
        );
        let reconciler =
            WebhookReconciler::new(store.clone(), gateway.clone(), dispatcher, None, 300);

        Self {
            store,
            gateway,
            notifier,
            booking,
            reconciler,
        }
    }

    /// Registers "Marcos" with a 5000-cent haircut (service 1) and a
    /// 3000-cent beard trim (service 2)
    pub async fn seed_professional(&self) -> Professional {
        self.store
            .create_professional(&new_professional("marcos@example.com"))
            .await
            .expect("seed professional")
    }
}

pub fn new_professional(email: &str) -> NewProfessional {
    NewProfessional {
        name: "Marcos".to_string(),
        email: email.to_string(),
        phone: "11988887777".to_string(),
        country_code: "+55".to_string(),
        push_target: Some("ExponentPushToken[marcos]".to_string()),
        working_hours: vec![WorkingHours {
            weekday: 6,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        }],
        services: vec![
            NewService {
                name: "Haircut".to_string(),
                duration_minutes: 30,
                price_cents: 5000,
                active: true,
            },
            NewService {
                name: "Beard trim".to_string(),
                duration_minutes: 20,
                price_cents: 3000,
                active: true,
            },
        ],
    }
}

pub fn card() -> CardDetails {
    CardDetails {
        number: "4242424242424242".to_string(),
        exp_month: 12,
        exp_year: 2030,
        cvc: "123".to_string(),
        holder_name: Some("Ana Souza".to_string()),
    }
}

pub fn booking_request(professional_id: i64, services: Vec<i64>) -> CreateBookingRequest {
    CreateBookingRequest {
        professional_id,
        services,
        date: "2024-01-20".to_string(),
        time: Some("10:00".to_string()),
        client: ClientContact {
            name: "Ana Souza".to_string(),
            email: "ana@example.com".to_string(),
            phone: "11999990000".to_string(),
            country_code: "+55".to_string(),
        },
        card: Some(card()),
    }
}
