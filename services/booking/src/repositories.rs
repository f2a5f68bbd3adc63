//! Persistence for professionals, clients, services, appointments and payments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AppointmentDetails, AppointmentQuery, AppointmentStatus, Client, ClientContact,
    NewProfessional, PaymentStatus, Professional, Service,
};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgScheduleStore;

/// Errors raised by a [`ScheduleStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another slot-holding appointment already occupies the slot
    #[error("slot already taken")]
    SlotTaken,

    /// A unique field (e.g. an email) is already in use
    #[error("duplicate value: {0}")]
    Duplicate(String),

    #[error("stored value is invalid: {0}")]
    InvalidRow(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything persisted when a booking commits
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub reference: Uuid,
    pub professional_id: i64,
    pub client_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub service_ids: Vec<i64>,
    pub payment: NewPayment,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub gateway_id: String,
}

/// Changes applied by [`ScheduleStore::update_appointment`]
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub status: Option<AppointmentStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Storage used by the booking workflow and the webhook reconciler.
///
/// `create_booking`, `update_appointment` and `apply_payment_event` must
/// refuse to leave two slot-holding appointments on the same professional
/// and instant, and report that as [`StoreError::SlotTaken`].
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create_professional(&self, payload: &NewProfessional) -> StoreResult<Professional>;
    async fn find_professional(&self, id: i64) -> StoreResult<Option<Professional>>;
    async fn list_professionals(&self) -> StoreResult<Vec<Professional>>;
    async fn count_appointments_for_professional(&self, id: i64) -> StoreResult<i64>;
    async fn deactivate_professional(&self, id: i64) -> StoreResult<()>;
    /// Removes the professional with its working hours and services
    async fn delete_professional(&self, id: i64) -> StoreResult<()>;
    async fn services_for_professional(&self, professional_id: i64) -> StoreResult<Vec<Service>>;

    /// Services whose id is in `ids`; missing ids are simply absent
    async fn find_services(&self, ids: &[i64]) -> StoreResult<Vec<Service>>;

    async fn find_or_create_client(&self, contact: &ClientContact) -> StoreResult<Client>;

    /// A slot-holding appointment of `professional_id` at `at`, other than `exclude`
    async fn find_slot_holder(
        &self,
        professional_id: i64,
        at: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> StoreResult<Option<AppointmentDetails>>;

    /// Inserts the appointment and its payment atomically
    async fn create_booking(&self, booking: &NewBooking) -> StoreResult<AppointmentDetails>;

    async fn find_appointment(&self, id: i64) -> StoreResult<Option<AppointmentDetails>>;
    async fn find_appointment_by_reference(
        &self,
        reference: Uuid,
    ) -> StoreResult<Option<AppointmentDetails>>;
    async fn find_appointment_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> StoreResult<Option<AppointmentDetails>>;
    async fn list_appointments(
        &self,
        query: &AppointmentQuery,
    ) -> StoreResult<Vec<AppointmentDetails>>;

    async fn update_appointment(
        &self,
        id: i64,
        changes: &AppointmentChanges,
    ) -> StoreResult<Option<AppointmentDetails>>;

    /// Sets the appointment status and the status of its payment together.
    ///
    /// When the new appointment status would take a slot that another
    /// appointment holds, neither row changes and [`StoreError::SlotTaken`]
    /// is returned.
    async fn apply_payment_event(
        &self,
        appointment_id: i64,
        appointment_status: AppointmentStatus,
        payment_status: PaymentStatus,
    ) -> StoreResult<Option<AppointmentDetails>>;

    /// Deletes the appointment and, by cascade, its payment
    async fn delete_appointment(&self, id: i64) -> StoreResult<bool>;
}
