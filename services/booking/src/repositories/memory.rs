//! In-memory [`ScheduleStore`] used by the unit tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AppointmentChanges, NewBooking, ScheduleStore, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentDetails, AppointmentQuery, AppointmentStatus, Client, ClientContact,
    NewProfessional, Payment, PaymentStatus, Professional, ProfessionalStatus, Service,
};

#[derive(Default)]
struct Tables {
    professionals: BTreeMap<i64, Professional>,
    services: BTreeMap<i64, Service>,
    clients: BTreeMap<i64, Client>,
    appointments: BTreeMap<i64, (Appointment, Vec<i64>)>,
    payments: BTreeMap<i64, Payment>,
    sequences: HashMap<&'static str, i64>,
}

impl Tables {
    /// Per-table sequence, like a `BIGSERIAL` column
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn details(&self, id: i64) -> Option<AppointmentDetails> {
        let (appointment, service_ids) = self.appointments.get(&id)?;
        let professional = self.professionals.get(&appointment.professional_id)?.clone();
        let client = appointment
            .client_id
            .and_then(|id| self.clients.get(&id).cloned());
        let services = service_ids
            .iter()
            .filter_map(|id| self.services.get(id).cloned())
            .collect();
        let payment = self
            .payments
            .values()
            .find(|p| p.appointment_id == id)
            .cloned();

        Some(AppointmentDetails {
            appointment: appointment.clone(),
            professional,
            client,
            services,
            payment,
        })
    }

    fn slot_taken(&self, professional_id: i64, at: DateTime<Utc>, exclude: Option<i64>) -> Option<i64> {
        self.appointments
            .values()
            .find(|(a, _)| {
                a.professional_id == professional_id
                    && a.scheduled_at == at
                    && a.status.holds_slot()
                    && Some(a.id) != exclude
            })
            .map(|(a, _)| a.id)
    }
}

/// Thread-safe in-memory store; every table numbers its rows from 1
#[derive(Default, Clone)]
pub struct InMemoryScheduleStore {
    tables: Arc<RwLock<Tables>>,
    fail_bookings: Arc<AtomicBool>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_booking` fail as if the database were down
    pub fn fail_bookings(&self) {
        self.fail_bookings.store(true, Ordering::SeqCst);
    }

    pub async fn appointment_count(&self) -> usize {
        self.tables.read().await.appointments.len()
    }

    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    pub async fn client_count(&self) -> usize {
        self.tables.read().await.clients.len()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn create_professional(&self, payload: &NewProfessional) -> StoreResult<Professional> {
        let mut tables = self.tables.write().await;
        let email = payload.email.trim().to_lowercase();
        if tables.professionals.values().any(|p| p.email == email) {
            return Err(StoreError::Duplicate(format!("professional email {}", email)));
        }

        let now = Utc::now();
        let professional = Professional {
            id: tables.next_id("professionals"),
            name: payload.name.clone(),
            email,
            phone: payload.phone.clone(),
            country_code: payload.country_code.clone(),
            push_target: payload.push_target.clone(),
            available: true,
            status: ProfessionalStatus::Active,
            working_hours: payload.working_hours.clone(),
            created_at: now,
            updated_at: now,
        };
        tables
            .professionals
            .insert(professional.id, professional.clone());

        for service in &payload.services {
            let id = tables.next_id("services");
            tables.services.insert(
                id,
                Service {
                    id,
                    professional_id: professional.id,
                    name: service.name.clone(),
                    duration_minutes: service.duration_minutes,
                    price_cents: service.price_cents,
                    active: service.active,
                },
            );
        }

        Ok(professional)
    }

    async fn find_professional(&self, id: i64) -> StoreResult<Option<Professional>> {
        Ok(self.tables.read().await.professionals.get(&id).cloned())
    }

    async fn list_professionals(&self) -> StoreResult<Vec<Professional>> {
        Ok(self
            .tables
            .read()
            .await
            .professionals
            .values()
            .cloned()
            .collect())
    }

    async fn count_appointments_for_professional(&self, id: i64) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|(a, _)| a.professional_id == id)
            .count() as i64)
    }

    async fn deactivate_professional(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(professional) = tables.professionals.get_mut(&id) {
            professional.status = ProfessionalStatus::Inactive;
            professional.available = false;
            professional.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_professional(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.professionals.remove(&id);
        tables.services.retain(|_, s| s.professional_id != id);
        Ok(())
    }

    async fn services_for_professional(&self, professional_id: i64) -> StoreResult<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .values()
            .filter(|s| s.professional_id == professional_id)
            .cloned()
            .collect())
    }

    async fn find_services(&self, ids: &[i64]) -> StoreResult<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .values()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn find_or_create_client(&self, contact: &ClientContact) -> StoreResult<Client> {
        let mut tables = self.tables.write().await;
        let email = contact.normalized_email();
        if let Some(client) = tables.clients.values().find(|c| c.email == email) {
            return Ok(client.clone());
        }

        let client = Client {
            id: tables.next_id("clients"),
            name: contact.name.clone(),
            email,
            phone: contact.phone.clone(),
            country_code: contact.country_code.clone(),
            created_at: Utc::now(),
        };
        tables.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn find_slot_holder(
        &self,
        professional_id: i64,
        at: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let tables = self.tables.read().await;
        Ok(tables
            .slot_taken(professional_id, at, exclude)
            .and_then(|id| tables.details(id)))
    }

    async fn create_booking(&self, booking: &NewBooking) -> StoreResult<AppointmentDetails> {
        if self.fail_bookings.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut tables = self.tables.write().await;
        if booking.status.holds_slot()
            && tables
                .slot_taken(booking.professional_id, booking.scheduled_at, None)
                .is_some()
        {
            return Err(StoreError::SlotTaken);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: tables.next_id("appointments"),
            reference: booking.reference,
            professional_id: booking.professional_id,
            client_id: Some(booking.client_id),
            scheduled_at: booking.scheduled_at,
            status: booking.status,
            created_at: now,
            updated_at: now,
        };
        let payment = Payment {
            id: tables.next_id("payments"),
            appointment_id: appointment.id,
            amount_cents: booking.payment.amount_cents,
            currency: booking.payment.currency.clone(),
            status: booking.payment.status,
            gateway_id: booking.payment.gateway_id.clone(),
            created_at: now,
            updated_at: now,
        };

        let id = appointment.id;
        tables
            .appointments
            .insert(id, (appointment, booking.service_ids.clone()));
        tables.payments.insert(payment.id, payment);

        tables
            .details(id)
            .ok_or_else(|| StoreError::InvalidRow(format!("appointment {} vanished", id)))
    }

    async fn find_appointment(&self, id: i64) -> StoreResult<Option<AppointmentDetails>> {
        Ok(self.tables.read().await.details(id))
    }

    async fn find_appointment_by_reference(
        &self,
        reference: Uuid,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .find(|(a, _)| a.reference == reference)
            .and_then(|(a, _)| tables.details(a.id)))
    }

    async fn find_appointment_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.gateway_id == gateway_id)
            .and_then(|p| tables.details(p.appointment_id)))
    }

    async fn list_appointments(
        &self,
        query: &AppointmentQuery,
    ) -> StoreResult<Vec<AppointmentDetails>> {
        let tables = self.tables.read().await;
        let mut appointments: Vec<AppointmentDetails> = tables
            .appointments
            .values()
            .filter(|(a, _)| query.matches(a))
            .filter_map(|(a, _)| tables.details(a.id))
            .collect();
        appointments.sort_by_key(|d| d.appointment.scheduled_at);
        Ok(appointments)
    }

    async fn update_appointment(
        &self,
        id: i64,
        changes: &AppointmentChanges,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let mut tables = self.tables.write().await;
        let Some((current, _)) = tables.appointments.get(&id) else {
            return Ok(None);
        };

        let status = changes.status.unwrap_or(current.status);
        let scheduled_at = changes.scheduled_at.unwrap_or(current.scheduled_at);
        let professional_id = current.professional_id;
        if status.holds_slot()
            && tables
                .slot_taken(professional_id, scheduled_at, Some(id))
                .is_some()
        {
            return Err(StoreError::SlotTaken);
        }

        if let Some((appointment, _)) = tables.appointments.get_mut(&id) {
            appointment.status = status;
            appointment.scheduled_at = scheduled_at;
            appointment.updated_at = Utc::now();
        }
        Ok(tables.details(id))
    }

    async fn apply_payment_event(
        &self,
        appointment_id: i64,
        appointment_status: AppointmentStatus,
        payment_status: PaymentStatus,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let mut tables = self.tables.write().await;
        let Some((current, _)) = tables.appointments.get(&appointment_id) else {
            return Ok(None);
        };

        let professional_id = current.professional_id;
        let scheduled_at = current.scheduled_at;
        if appointment_status.holds_slot()
            && tables
                .slot_taken(professional_id, scheduled_at, Some(appointment_id))
                .is_some()
        {
            return Err(StoreError::SlotTaken);
        }

        let now = Utc::now();
        if let Some((appointment, _)) = tables.appointments.get_mut(&appointment_id) {
            appointment.status = appointment_status;
            appointment.updated_at = now;
        }
        for payment in tables
            .payments
            .values_mut()
            .filter(|p| p.appointment_id == appointment_id)
        {
            payment.status = payment_status;
            payment.updated_at = now;
        }
        Ok(tables.details(appointment_id))
    }

    async fn delete_appointment(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.appointments.remove(&id).is_some();
        if removed {
            tables.payments.retain(|_, p| p.appointment_id != id);
        }
        Ok(removed)
    }
}
