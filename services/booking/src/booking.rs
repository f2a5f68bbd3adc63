//! Booking workflow, schedule operations and professional management

use std::{collections::BTreeMap, sync::Arc};

use common::notifications::{Dispatcher, Outbound, PushMessage, SmsMessage};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    gateway::{ChargeRequest, ChargeStatus, PaymentGateway},
    models::{
        AppointmentDetails, AppointmentQuery, AppointmentStatus, CreateBookingRequest,
        NewProfessional, PaymentStatus, Professional, ProfessionalStatus, Service,
        UpdateAppointmentRequest,
        appointment::combine_date_time, service::total_price,
    },
    repositories::{AppointmentChanges, NewBooking, NewPayment, ScheduleStore, StoreError},
};

const SLOT_TAKEN: &str = "professional is not available at this time";

/// A professional with the services it offers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalProfile {
    #[serde(flatten)]
    pub professional: Professional,
    pub services: Vec<Service>,
}

/// Outcome of [`BookingService::remove_professional`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Removal {
    /// Appointments still reference the professional; marked inactive instead
    Deactivated,
    Deleted,
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn ScheduleStore>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: Dispatcher,
    currency: String,
    admin_push_target: Option<String>,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: Dispatcher,
        currency: &str,
        admin_push_target: Option<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            dispatcher,
            currency: currency.to_lowercase(),
            admin_push_target,
        }
    }

    /// Book, charge and persist an appointment.
    ///
    /// Every validation runs before the first side effect; a declined charge
    /// persists nothing, and a charge whose booking cannot be stored is
    /// refunded.
    #[tracing::instrument(
        skip(self, request),
        fields(component = "booking", operation = "create", professional_id = request.professional_id)
    )]
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> ApiResult<AppointmentDetails> {
        self.book(request).await.inspect_err(|e| log_failure("create", e))
    }

    async fn book(&self, request: CreateBookingRequest) -> ApiResult<AppointmentDetails> {
        let professional = self
            .store
            .find_professional(request.professional_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("professional not found".to_string()))?;
        if !professional.available || professional.status != ProfessionalStatus::Active {
            return Err(ApiError::BadRequest(
                "professional is not accepting bookings".to_string(),
            ));
        }

        let services = self
            .resolve_services(professional.id, &request.services)
            .await?;

        let scheduled_at = combine_date_time(&request.date, request.time.as_deref())
            .ok_or_else(|| ApiError::BadRequest("invalid date or time".to_string()))?;

        if self
            .store
            .find_slot_holder(professional.id, scheduled_at, None)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
        }

        let card = request
            .card
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("payment information is required".to_string()))?;
        request.client.validate().map_err(ApiError::BadRequest)?;

        let client = self.store.find_or_create_client(&request.client).await?;

        let reference = Uuid::new_v4();
        let amount_cents = total_price(&services);
        let source = self.gateway.tokenize_card(card).await?;
        let charge = self
            .gateway
            .create_charge(&ChargeRequest {
                amount_cents,
                currency: self.currency.clone(),
                source,
                description: format!("Appointment with {}", professional.name),
                idempotency_key: reference.to_string(),
                metadata: BTreeMap::from([("appointmentId".to_string(), reference.to_string())]),
            })
            .await?;

        if charge.status == ChargeStatus::Failed {
            return Err(ApiError::PaymentFailed(
                charge
                    .failure_message
                    .unwrap_or_else(|| "payment failed".to_string()),
            ));
        }

        let status = match charge.status {
            ChargeStatus::Succeeded => AppointmentStatus::Confirmed,
            _ => AppointmentStatus::Pending,
        };
        let booking = NewBooking {
            reference,
            professional_id: professional.id,
            client_id: client.id,
            scheduled_at,
            status,
            service_ids: services.iter().map(|s| s.id).collect(),
            payment: NewPayment {
                amount_cents,
                currency: self.currency.clone(),
                status: PaymentStatus::from(charge.status),
                gateway_id: charge.id.clone(),
            },
        };

        let details = match self.store.create_booking(&booking).await {
            Ok(details) => details,
            Err(e) => {
                self.refund(&charge.id, &reference).await;
                return Err(match e {
                    StoreError::SlotTaken => ApiError::Conflict(SLOT_TAKEN.to_string()),
                    other => other.into(),
                });
            }
        };

        info!(
            appointment_id = details.appointment.id,
            %reference,
            status = %details.appointment.status,
            "Appointment booked"
        );

        self.dispatcher.dispatch(self.booking_notices(&details)).await;
        Ok(details)
    }

    /// Active services of `professional_id` for every requested id
    async fn resolve_services(&self, professional_id: i64, ids: &[i64]) -> ApiResult<Vec<Service>> {
        let mut wanted = ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let services = self.store.find_services(&wanted).await?;
        if wanted.is_empty() || services.len() != wanted.len() {
            return Err(ApiError::BadRequest(
                "one or more services not found".to_string(),
            ));
        }
        if services
            .iter()
            .any(|s| !s.active || s.professional_id != professional_id)
        {
            return Err(ApiError::BadRequest(
                "one or more services are not offered by this professional".to_string(),
            ));
        }
        Ok(services)
    }

    async fn refund(&self, charge_id: &str, reference: &Uuid) {
        match self.gateway.create_refund(charge_id).await {
            Ok(refund) => warn!(
                charge_id,
                %reference,
                refund_id = %refund.id,
                "Booking not stored, charge refunded"
            ),
            Err(e) => error!(
                charge_id,
                %reference,
                error = %e,
                "Booking not stored and refund failed"
            ),
        }
    }

    fn booking_notices(&self, details: &AppointmentDetails) -> Vec<Outbound> {
        let professional = &details.professional;
        let when = details.appointment.scheduled_at.format("%d/%m/%Y %H:%M");
        let client_name = details
            .client
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("A client");
        let services = details
            .services
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let data = json!({
            "appointmentId": details.appointment.id,
            "reference": details.appointment.reference,
        });

        let mut notices = Vec::new();
        if let Some(target) = &professional.push_target {
            notices.push(Outbound::Push(PushMessage {
                target: target.clone(),
                title: "New appointment".to_string(),
                body: format!("{} booked {} on {}", client_name, services, when),
                data: data.clone(),
            }));
        }
        if let Some(target) = &self.admin_push_target {
            notices.push(Outbound::Push(PushMessage {
                target: target.clone(),
                title: "New appointment".to_string(),
                body: format!("{} with {} on {}", client_name, professional.name, when),
                data,
            }));
        }
        if let Some(client) = &details.client {
            notices.push(Outbound::Sms(SmsMessage {
                to: client.phone_number(),
                body: format!(
                    "Your appointment with {} on {} is booked.",
                    professional.name, when
                ),
            }));
        }
        notices.push(Outbound::Sms(SmsMessage {
            to: professional.phone_number(),
            body: format!("New appointment: {} on {} ({}).", client_name, when, services),
        }));
        notices
    }

    pub async fn list_appointments(
        &self,
        query: &AppointmentQuery,
    ) -> ApiResult<Vec<AppointmentDetails>> {
        Ok(self.store.list_appointments(query).await?)
    }

    pub async fn get_appointment(&self, id: i64) -> ApiResult<AppointmentDetails> {
        self.store
            .find_appointment(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("appointment not found".to_string()))
    }

    /// Change status and/or slot; a move re-checks the slot, ignoring the
    /// appointment itself
    #[tracing::instrument(skip(self, patch), fields(component = "booking", operation = "update"))]
    pub async fn update_appointment(
        &self,
        id: i64,
        patch: UpdateAppointmentRequest,
    ) -> ApiResult<AppointmentDetails> {
        self.reschedule(id, patch)
            .await
            .inspect_err(|e| log_failure("update", e))
    }

    async fn reschedule(
        &self,
        id: i64,
        patch: UpdateAppointmentRequest,
    ) -> ApiResult<AppointmentDetails> {
        let current = self.get_appointment(id).await?;
        let scheduled_at = patch
            .resolve_schedule(current.appointment.scheduled_at)
            .map_err(ApiError::BadRequest)?;

        let status = patch.status.unwrap_or(current.appointment.status);
        if let Some(at) = scheduled_at.filter(|_| status.holds_slot()) {
            let holder = self
                .store
                .find_slot_holder(current.appointment.professional_id, at, Some(id))
                .await?;
            if holder.is_some() {
                return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
            }
        }

        let changes = AppointmentChanges {
            status: patch.status,
            scheduled_at,
        };
        match self.store.update_appointment(id, &changes).await {
            Ok(Some(details)) => Ok(details),
            Ok(None) => Err(ApiError::NotFound("appointment not found".to_string())),
            Err(StoreError::SlotTaken) => Err(ApiError::Conflict(SLOT_TAKEN.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_appointment(&self, id: i64) -> ApiResult<()> {
        if self.store.delete_appointment(id).await? {
            info!(appointment_id = id, "Appointment deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound("appointment not found".to_string()))
        }
    }

    #[tracing::instrument(skip_all, fields(component = "professional", operation = "register"))]
    pub async fn register_professional(
        &self,
        payload: NewProfessional,
    ) -> ApiResult<ProfessionalProfile> {
        payload.validate().map_err(ApiError::BadRequest)?;

        let professional = match self.store.create_professional(&payload).await {
            Ok(professional) => professional,
            Err(StoreError::Duplicate(_)) => {
                return Err(ApiError::Conflict(
                    "a professional with this email already exists".to_string(),
                ));
            }
            Err(e) => {
                let err = ApiError::from(e);
                log_failure("register", &err);
                return Err(err);
            }
        };
        let services = self.store.services_for_professional(professional.id).await?;

        info!(professional_id = professional.id, "Professional registered");
        Ok(ProfessionalProfile {
            professional,
            services,
        })
    }

    pub async fn list_professionals(&self) -> ApiResult<Vec<Professional>> {
        Ok(self.store.list_professionals().await?)
    }

    pub async fn get_professional(&self, id: i64) -> ApiResult<ProfessionalProfile> {
        let professional = self
            .store
            .find_professional(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("professional not found".to_string()))?;
        let services = self.store.services_for_professional(id).await?;

        Ok(ProfessionalProfile {
            professional,
            services,
        })
    }

    /// Hard-deletes a professional nobody booked; otherwise only deactivates it
    #[tracing::instrument(skip(self), fields(component = "professional", operation = "remove"))]
    pub async fn remove_professional(&self, id: i64) -> ApiResult<Removal> {
        if self.store.find_professional(id).await?.is_none() {
            return Err(ApiError::NotFound("professional not found".to_string()));
        }

        if self.store.count_appointments_for_professional(id).await? > 0 {
            self.store.deactivate_professional(id).await?;
            info!(professional_id = id, "Professional deactivated");
            Ok(Removal::Deactivated)
        } else {
            self.store.delete_professional(id).await?;
            info!(professional_id = id, "Professional deleted");
            Ok(Removal::Deleted)
        }
    }
}

fn log_failure(operation: &str, err: &ApiError) {
    match err {
        ApiError::Store(_) | ApiError::Gateway(_) => {
            error!(operation, error = %err, "Booking operation failed")
        }
        _ => warn!(operation, error = %err, "Booking operation rejected"),
    }
}
