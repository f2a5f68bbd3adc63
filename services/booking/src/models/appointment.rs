//! Appointment (schedule) model, booking payloads and date handling

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    client::{Client, ClientContact},
    payment::Payment,
    professional::Professional,
    service::{Service, total_price},
};

/// Appointment lifecycle: `pending -> confirmed -> completed`, or one of the
/// terminal `cancelled` / `payment_failed` states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
    PaymentFailed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::PaymentFailed => "payment_failed",
        }
    }

    /// Whether an appointment in this state keeps its slot occupied
    pub fn holds_slot(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::PaymentFailed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "payment_failed" => Ok(AppointmentStatus::PaymentFailed),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

/// Appointment entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: i64,
    /// Assigned before the row exists; travels with the gateway charge
    pub reference: Uuid,
    pub professional_id: i64,
    pub client_id: Option<i64>,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An appointment with everything it references
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDetails {
    pub appointment: Appointment,
    pub professional: Professional,
    pub client: Option<Client>,
    pub services: Vec<Service>,
    pub payment: Option<Payment>,
}

/// Wire representation of [`AppointmentDetails`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub id: i64,
    pub reference: Uuid,
    pub date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub professional_id: i64,
    pub client_id: Option<i64>,
    pub services: Vec<i64>,
    pub service_items: Vec<Service>,
    pub total_cents: i64,
    pub professional: Professional,
    pub client: Option<Client>,
    pub payment: Option<Payment>,
}

impl From<AppointmentDetails> for AppointmentResponse {
    fn from(details: AppointmentDetails) -> Self {
        let AppointmentDetails {
            appointment,
            professional,
            client,
            services,
            payment,
        } = details;

        Self {
            id: appointment.id,
            reference: appointment.reference,
            date_time: appointment.scheduled_at,
            status: appointment.status,
            professional_id: appointment.professional_id,
            client_id: appointment.client_id,
            services: services.iter().map(|s| s.id).collect(),
            total_cents: total_price(&services),
            service_items: services,
            professional,
            client,
            payment,
        }
    }
}

/// Card data as entered by the client. Never logged.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
    pub holder_name: Option<String>,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits: String = self.number.chars().filter(char::is_ascii_digit).collect();
        let last4 = digits.get(digits.len().saturating_sub(4)..).unwrap_or("");
        f.debug_struct("CardDetails")
            .field("number", &format_args!("**** {}", last4))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

/// Booking request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub professional_id: i64,
    pub services: Vec<i64>,
    /// `YYYY-MM-DD`, or a full RFC 3339 timestamp
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`; when absent `date` must be a full timestamp
    pub time: Option<String>,
    pub client: ClientContact,
    pub card: Option<CardDetails>,
}

/// Partial update of an appointment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl UpdateAppointmentRequest {
    /// New slot for the appointment, if the patch moves it.
    ///
    /// A lone date keeps the current time of day and a lone time keeps the
    /// current date.
    pub fn resolve_schedule(
        &self,
        current: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, String> {
        let invalid = || "invalid date or time".to_string();
        match (self.date.as_deref(), self.time.as_deref()) {
            (None, None) => Ok(None),
            (Some(date), Some(time)) => combine_date_time(date, Some(time))
                .map(Some)
                .ok_or_else(invalid),
            (Some(date), None) => combine_date_time(date, None)
                .or_else(|| {
                    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
                    Some(day.and_time(current.time()).and_utc())
                })
                .map(Some)
                .ok_or_else(invalid),
            (None, Some(time)) => {
                let time = parse_time_of_day(time).ok_or_else(invalid)?;
                Ok(Some(current.date_naive().and_time(time).and_utc()))
            }
        }
    }
}

/// Filters for listing appointments
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    pub professional_id: Option<i64>,
    pub client_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.professional_id
            .is_none_or(|id| appointment.professional_id == id)
            && self
                .client_id
                .is_none_or(|id| appointment.client_id == Some(id))
            && self.status.is_none_or(|s| appointment.status == s)
            && self
                .date
                .is_none_or(|d| appointment.scheduled_at.date_naive() == d)
    }
}

/// Combine a calendar date and a time of day into one UTC instant.
///
/// A date carrying its own time component (RFC 3339) contributes only its
/// date part when `time` is given, and is used as-is otherwise.
pub fn combine_date_time(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = date.trim();

    let Some(time) = time else {
        return DateTime::parse_from_rfc3339(date)
            .ok()
            .map(|d| d.with_timezone(&Utc));
    };

    let date_part = if date.len() > 10 { date.get(..10)? } else { date };
    let day = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    let time = parse_time_of_day(time)?;

    Some(day.and_time(time).and_utc())
}

fn parse_time_of_day(time: &str) -> Option<NaiveTime> {
    let time = time.trim();
    NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()
}
