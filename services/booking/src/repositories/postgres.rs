//! PostgreSQL implementation of [`ScheduleStore`]

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::{AppointmentChanges, NewBooking, ScheduleStore, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentDetails, AppointmentQuery, AppointmentStatus, Client, ClientContact,
    NewProfessional, Payment, PaymentStatus, Professional, Service, WorkingHours,
};

const SLOT_CONSTRAINT: &str = "appointments_slot_unique";

const PROFESSIONAL_COLUMNS: &str =
    "id, name, email, phone, country_code, push_target, available, status, created_at, updated_at";

const SERVICE_COLUMNS: &str = "id, professional_id, name, duration_minutes, price_cents, active";

const CLIENT_COLUMNS: &str = "id, name, email, phone, country_code, created_at";

const APPOINTMENT_COLUMNS: &str =
    "a.id, a.reference, a.professional_id, a.client_id, a.scheduled_at, a.status, a.created_at, a.updated_at";

const PAYMENT_COLUMNS: &str =
    "id, appointment_id, amount_cents, currency, status, gateway_id, created_at, updated_at";

/// Schedule store backed by PostgreSQL
#[derive(Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    /// Create a new schedule store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn working_hours(&self, professional_id: i64) -> StoreResult<Vec<WorkingHours>> {
        let rows = sqlx::query(
            r#"
            SELECT weekday, start_time, end_time
            FROM working_hours
            WHERE professional_id = $1
            ORDER BY weekday
            "#,
        )
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(working_hours_from_row).collect()
    }

    async fn find_client(&self, id: i64) -> StoreResult<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {} FROM clients WHERE id = $1", CLIENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    async fn appointment_services(&self, appointment_id: i64) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM services
            WHERE id IN (SELECT service_id FROM appointment_services WHERE appointment_id = $1)
            ORDER BY id
            "#,
            SERVICE_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(service_from_row).collect()
    }

    async fn appointment_payment(&self, appointment_id: i64) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE appointment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    /// Load everything an appointment references
    async fn details(&self, appointment: Appointment) -> StoreResult<AppointmentDetails> {
        let professional = self
            .find_professional(appointment.professional_id)
            .await?
            .ok_or_else(|| {
                StoreError::InvalidRow(format!(
                    "appointment {} references missing professional {}",
                    appointment.id, appointment.professional_id
                ))
            })?;

        let client = match appointment.client_id {
            Some(id) => self.find_client(id).await?,
            None => None,
        };
        let services = self.appointment_services(appointment.id).await?;
        let payment = self.appointment_payment(appointment.id).await?;

        Ok(AppointmentDetails {
            appointment,
            professional,
            client,
            services,
            payment,
        })
    }

    async fn details_from_row(&self, row: Option<PgRow>) -> StoreResult<Option<AppointmentDetails>> {
        match row {
            Some(row) => {
                let appointment = appointment_from_row(&row)?;
                Ok(Some(self.details(appointment).await?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn create_professional(&self, payload: &NewProfessional) -> StoreResult<Professional> {
        info!("Creating professional: {}", payload.email);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO professionals (name, email, phone, country_code, push_target)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROFESSIONAL_COLUMNS
        ))
        .bind(&payload.name)
        .bind(payload.email.trim().to_lowercase())
        .bind(&payload.phone)
        .bind(&payload.country_code)
        .bind(&payload.push_target)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let id: i64 = row.try_get("id")?;

        for hours in &payload.working_hours {
            sqlx::query(
                r#"
                INSERT INTO working_hours (professional_id, weekday, start_time, end_time)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(id)
            .bind(hours.weekday)
            .bind(hours.start)
            .bind(hours.end)
            .execute(&mut *tx)
            .await?;
        }

        for service in &payload.services {
            sqlx::query(
                r#"
                INSERT INTO services (professional_id, name, duration_minutes, price_cents, active)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(&service.name)
            .bind(service.duration_minutes)
            .bind(service.price_cents)
            .bind(service.active)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        professional_from_row(&row, payload.working_hours.clone())
    }

    async fn find_professional(&self, id: i64) -> StoreResult<Option<Professional>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM professionals WHERE id = $1",
            PROFESSIONAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let hours = self.working_hours(id).await?;
                Ok(Some(professional_from_row(&row, hours)?))
            }
            None => Ok(None),
        }
    }

    async fn list_professionals(&self) -> StoreResult<Vec<Professional>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM professionals ORDER BY id",
            PROFESSIONAL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let hour_rows = sqlx::query(
            "SELECT professional_id, weekday, start_time, end_time FROM working_hours ORDER BY weekday",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hours_by_professional: HashMap<i64, Vec<WorkingHours>> = HashMap::new();
        for row in &hour_rows {
            let professional_id: i64 = row.try_get("professional_id")?;
            hours_by_professional
                .entry(professional_id)
                .or_default()
                .push(working_hours_from_row(row)?);
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let hours = hours_by_professional.remove(&id).unwrap_or_default();
                professional_from_row(row, hours)
            })
            .collect()
    }

    async fn count_appointments_for_professional(&self, id: i64) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE professional_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn deactivate_professional(&self, id: i64) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE professionals
            SET status = 'inactive', available = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_professional(&self, id: i64) -> StoreResult<()> {
        // working_hours and services cascade
        sqlx::query("DELETE FROM professionals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn services_for_professional(&self, professional_id: i64) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM services WHERE professional_id = $1 ORDER BY id",
            SERVICE_COLUMNS
        ))
        .bind(professional_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(service_from_row).collect()
    }

    async fn find_services(&self, ids: &[i64]) -> StoreResult<Vec<Service>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM services WHERE id = ANY($1) ORDER BY id",
            SERVICE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(service_from_row).collect()
    }

    async fn find_or_create_client(&self, contact: &ClientContact) -> StoreResult<Client> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO clients (name, email, phone, country_code)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(&contact.name)
        .bind(contact.normalized_email())
        .bind(&contact.phone)
        .bind(&contact.country_code)
        .fetch_one(&self.pool)
        .await?;

        client_from_row(&row)
    }

    async fn find_slot_holder(
        &self,
        professional_id: i64,
        at: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM appointments a
            WHERE a.professional_id = $1
              AND a.scheduled_at = $2
              AND a.status NOT IN ('cancelled', 'payment_failed')
              AND ($3::BIGINT IS NULL OR a.id <> $3)
            LIMIT 1
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(professional_id)
        .bind(at)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        self.details_from_row(row).await
    }

    async fn create_booking(&self, booking: &NewBooking) -> StoreResult<AppointmentDetails> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO appointments AS a (reference, professional_id, client_id, scheduled_at, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(booking.reference)
        .bind(booking.professional_id)
        .bind(booking.client_id)
        .bind(booking.scheduled_at)
        .bind(booking.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let appointment = appointment_from_row(&row)?;

        for service_id in &booking.service_ids {
            sqlx::query(
                "INSERT INTO appointment_services (appointment_id, service_id) VALUES ($1, $2)",
            )
            .bind(appointment.id)
            .bind(service_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO payments (appointment_id, amount_cents, currency, status, gateway_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(appointment.id)
        .bind(booking.payment.amount_cents)
        .bind(&booking.payment.currency)
        .bind(booking.payment.status.as_str())
        .bind(&booking.payment.gateway_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            appointment_id = appointment.id,
            reference = %appointment.reference,
            "Booking persisted"
        );

        self.details(appointment).await
    }

    async fn find_appointment(&self, id: i64) -> StoreResult<Option<AppointmentDetails>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments a WHERE a.id = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.details_from_row(row).await
    }

    async fn find_appointment_by_reference(
        &self,
        reference: Uuid,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments a WHERE a.reference = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        self.details_from_row(row).await
    }

    async fn find_appointment_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM appointments a
            JOIN payments p ON p.appointment_id = a.id
            WHERE p.gateway_id = $1
            LIMIT 1
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(gateway_id)
        .fetch_optional(&self.pool)
        .await?;

        self.details_from_row(row).await
    }

    async fn list_appointments(
        &self,
        query: &AppointmentQuery,
    ) -> StoreResult<Vec<AppointmentDetails>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM appointments a
            WHERE ($1::BIGINT IS NULL OR a.professional_id = $1)
              AND ($2::BIGINT IS NULL OR a.client_id = $2)
              AND ($3::TEXT IS NULL OR a.status = $3)
              AND ($4::DATE IS NULL OR (a.scheduled_at AT TIME ZONE 'UTC')::DATE = $4)
            ORDER BY a.scheduled_at
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(query.professional_id)
        .bind(query.client_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.date)
        .fetch_all(&self.pool)
        .await?;

        let mut appointments = Vec::with_capacity(rows.len());
        for row in &rows {
            let appointment = appointment_from_row(row)?;
            appointments.push(self.details(appointment).await?);
        }

        Ok(appointments)
    }

    async fn update_appointment(
        &self,
        id: i64,
        changes: &AppointmentChanges,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE appointments AS a
            SET status = COALESCE($2, a.status),
                scheduled_at = COALESCE($3, a.scheduled_at),
                updated_at = NOW()
            WHERE a.id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.scheduled_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.details_from_row(row).await
    }

    async fn apply_payment_event(
        &self,
        appointment_id: i64,
        appointment_status: AppointmentStatus,
        payment_status: PaymentStatus,
    ) -> StoreResult<Option<AppointmentDetails>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE appointments AS a
            SET status = $2, updated_at = NOW()
            WHERE a.id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(appointment_status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let appointment = appointment_from_row(&row)?;

        sqlx::query(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .bind(payment_status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.details(appointment).await.map(Some)
    }

    async fn delete_appointment(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Translate unique violations into domain errors
fn map_write_error(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        if db.constraint() == Some(SLOT_CONSTRAINT) {
            return StoreError::SlotTaken;
        }
        if db.is_unique_violation() {
            return StoreError::Duplicate(db.message().to_string());
        }
    }
    StoreError::Database(error)
}

fn parse_column<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::InvalidRow)
}

fn working_hours_from_row(row: &PgRow) -> StoreResult<WorkingHours> {
    Ok(WorkingHours {
        weekday: row.try_get("weekday")?,
        start: row.try_get("start_time")?,
        end: row.try_get("end_time")?,
    })
}

fn professional_from_row(row: &PgRow, working_hours: Vec<WorkingHours>) -> StoreResult<Professional> {
    Ok(Professional {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        country_code: row.try_get("country_code")?,
        push_target: row.try_get("push_target")?,
        available: row.try_get("available")?,
        status: parse_column(row, "status")?,
        working_hours,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn service_from_row(row: &PgRow) -> StoreResult<Service> {
    Ok(Service {
        id: row.try_get("id")?,
        professional_id: row.try_get("professional_id")?,
        name: row.try_get("name")?,
        duration_minutes: row.try_get("duration_minutes")?,
        price_cents: row.try_get("price_cents")?,
        active: row.try_get("active")?,
    })
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        country_code: row.try_get("country_code")?,
        created_at: row.try_get("created_at")?,
    })
}

fn appointment_from_row(row: &PgRow) -> StoreResult<Appointment> {
    Ok(Appointment {
        id: row.try_get("id")?,
        reference: row.try_get("reference")?,
        professional_id: row.try_get("professional_id")?,
        client_id: row.try_get("client_id")?,
        scheduled_at: row.try_get("scheduled_at")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> StoreResult<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        appointment_id: row.try_get("appointment_id")?,
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        status: parse_column(row, "status")?,
        gateway_id: row.try_get("gateway_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
