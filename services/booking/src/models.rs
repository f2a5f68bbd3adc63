//! API models for request and response payloads

use serde::Serialize;

pub mod appointment;
pub mod client;
pub mod payment;
pub mod professional;
pub mod service;

pub use appointment::{
    Appointment, AppointmentDetails, AppointmentQuery, AppointmentResponse, AppointmentStatus,
    CardDetails, CreateBookingRequest, UpdateAppointmentRequest,
};
pub use client::{Client, ClientContact};
pub use payment::{Payment, PaymentStatus};
pub use professional::{NewProfessional, Professional, ProfessionalStatus, WorkingHours};
pub use service::{NewService, Service};

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
