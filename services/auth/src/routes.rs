//! Authentication service routes

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use common::notifications::{EmailMessage, Outbound};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    error::{AuthError, AuthResult},
    models::{
        ApiResponse, ConfirmRequest, Credential, EmailRequest, NewUser, RegisterRequest,
        ResetPasswordRequest, SessionAction, SessionHash, User, UserResponse,
    },
    password::hash_password,
    state::AppState,
    validation::{validate_email, validate_password, validate_registration},
};

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/confirm", post(confirm))
        .route("/auth/confirm/resend", post(resend_confirmation))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

fn session_email(user: &User, issued: &SessionHash) -> Outbound {
    let (subject, intro) = match issued.action {
        SessionAction::ConfirmRegister => (
            "Confirm your account",
            "use the code below to confirm your account",
        ),
        SessionAction::ResetPassword => (
            "Reset your password",
            "use the code below to choose a new password",
        ),
    };

    Outbound::Email(EmailMessage {
        to: user.email.clone(),
        subject: subject.to_string(),
        text: format!(
            "Hello {}, {}: {}\n\nOr present this token: {}\n\nIt expires at {}.",
            user.name,
            intro,
            issued.code,
            issued.hash,
            issued.expires_at.format("%d/%m/%Y %H:%M UTC")
        ),
        html: None,
    })
}

fn require_credential(credential: Option<Credential>) -> AuthResult<Credential> {
    credential.ok_or_else(|| AuthError::BadRequest("hash or code is required".to_string()))
}

/// Create an inactive user and email the confirmation code
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload?;
    validate_registration(&payload).map_err(AuthError::BadRequest)?;

    let user = state
        .store
        .create_user(&NewUser {
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
            password_hash: hash_password(&payload.password)?,
        })
        .await?;
    info!(user_id = user.id, "User registered");

    let issued = state
        .session_hashes
        .issue(user.id, SessionAction::ConfirmRegister)
        .await?;
    state
        .dispatcher
        .dispatch(vec![session_email(&user, &issued)])
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(user))),
    ))
}

/// Activate an account with its confirmation hash or code
pub async fn confirm(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload?;
    let credential = require_credential(payload.credential())?;

    let key = format!("confirm:{}", payload.user_id);
    if !state.rate_limiter.check(&key).await {
        return Err(AuthError::TooManyAttempts);
    }

    state
        .store
        .find_user(payload.user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

    state
        .session_hashes
        .validate(
            payload.user_id,
            SessionAction::ConfirmRegister,
            &credential,
            None,
        )
        .await?;
    state.rate_limiter.reset(&key).await;

    Ok(Json(ApiResponse::ok(json!({
        "userId": payload.user_id,
        "active": true,
    }))))
}

/// Send the confirmation email again, reusing a still-valid hash
pub async fn resend_confirmation(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload?;
    let email = payload.email.trim().to_lowercase();

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;
    if user.active {
        return Err(AuthError::Conflict("account already confirmed".to_string()));
    }

    let issued = state
        .session_hashes
        .issue(user.id, SessionAction::ConfirmRegister)
        .await?;
    state
        .dispatcher
        .dispatch(vec![session_email(&user, &issued)])
        .await;

    Ok(Json(ApiResponse::ok(json!({ "sent": true }))))
}

/// Email a password reset code; unknown addresses get the same answer
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload?;
    let email = payload.email.trim().to_lowercase();
    validate_email(&email).map_err(AuthError::BadRequest)?;

    if let Some(user) = state.store.find_user_by_email(&email).await? {
        let issued = state
            .session_hashes
            .issue(user.id, SessionAction::ResetPassword)
            .await?;
        state
            .dispatcher
            .dispatch(vec![session_email(&user, &issued)])
            .await;
    } else {
        info!("Password reset requested for an unknown email");
    }

    Ok(Json(ApiResponse::ok(json!({
        "message": "If the email is registered, a reset code was sent",
    }))))
}

/// Replace the password using a reset hash or code
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(payload) = payload?;
    let credential = require_credential(payload.credential())?;
    validate_password(&payload.password).map_err(AuthError::BadRequest)?;

    let key = format!("reset:{}", payload.user_id);
    if !state.rate_limiter.check(&key).await {
        return Err(AuthError::TooManyAttempts);
    }

    state
        .session_hashes
        .validate(
            payload.user_id,
            SessionAction::ResetPassword,
            &credential,
            Some(&payload.password),
        )
        .await?;
    state.rate_limiter.reset(&key).await;
    info!(user_id = payload.user_id, "Password reset");

    Ok(Json(ApiResponse::ok(json!({ "userId": payload.user_id }))))
}
