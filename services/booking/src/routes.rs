//! Booking service routes

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    error::ApiError,
    models::{
        ApiResponse, AppointmentQuery, AppointmentResponse, CreateBookingRequest, NewProfessional,
        UpdateAppointmentRequest,
    },
    state::AppState,
    webhook::SIGNATURE_HEADER,
};

/// Create the router for the booking service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/professionals",
            post(register_professional).get(list_professionals),
        )
        .route(
            "/professionals/:id",
            get(get_professional).delete(remove_professional),
        )
        .route("/schedule", post(create_appointment).get(list_appointments))
        .route(
            "/schedule/:id",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
        .route("/payment/webhook", post(payment_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "booking-service"
    }))
}

/// Register a professional with working hours and services
pub async fn register_professional(
    State(state): State<AppState>,
    payload: Result<Json<NewProfessional>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let profile = state.booking.register_professional(payload).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(profile))))
}

pub async fn list_professionals(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let professionals = state.booking.list_professionals().await?;

    Ok(Json(ApiResponse::ok(professionals)))
}

pub async fn get_professional(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let profile = state.booking.get_professional(id).await?;

    Ok(Json(ApiResponse::ok(profile)))
}

/// Delete a professional, or deactivate it when appointments reference it
pub async fn remove_professional(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let removal = state.booking.remove_professional(id).await?;

    Ok(Json(ApiResponse::ok(json!({
        "id": id,
        "removal": removal,
    }))))
}

/// Book, pay for and confirm an appointment
pub async fn create_appointment(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let details = state.booking.create_booking(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AppointmentResponse::from(details))),
    ))
}

/// List appointments, optionally filtered
pub async fn list_appointments(
    State(state): State<AppState>,
    query: Result<Query<AppointmentQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let appointments: Vec<AppointmentResponse> = state
        .booking
        .list_appointments(&query)
        .await?
        .into_iter()
        .map(AppointmentResponse::from)
        .collect();

    Ok(Json(ApiResponse::ok(appointments)))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let details = state.booking.get_appointment(id).await?;

    Ok(Json(ApiResponse::ok(AppointmentResponse::from(details))))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateAppointmentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let details = state.booking.update_appointment(id, patch).await?;

    Ok(Json(ApiResponse::ok(AppointmentResponse::from(details))))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(id) = id?;
    state.booking.delete_appointment(id).await?;

    Ok(Json(ApiResponse::ok(json!({ "id": id, "deleted": true }))))
}

/// Gateway event callback; the raw body is needed for signature checks
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state.reconciler.handle(signature, &body).await?;

    Ok(Json(ApiResponse::ok(outcome)))
}
