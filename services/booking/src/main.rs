use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

mod booking;
mod config;
mod error;
mod gateway;
mod models;
mod repositories;
mod routes;
mod state;
mod webhook;

#[cfg(test)]
mod testing;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    notifications::{ChannelNotifier, Dispatcher},
};

use crate::{
    booking::BookingService, config::Settings, gateway::StripeGateway,
    repositories::PgScheduleStore, state::AppState, webhook::WebhookReconciler,
};

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init("booking-service");

    info!("Starting booking service");

    let settings = Settings::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    if settings.payment.secret_key.is_empty() {
        warn!("BOOKING__PAYMENT__SECRET_KEY is not set, charges will be rejected by the gateway");
    }

    let store = Arc::new(PgScheduleStore::new(pool));
    let gateway = Arc::new(StripeGateway::new(
        &settings.payment.api_base,
        &settings.payment.secret_key,
        reqwest::Client::new(),
    ));

    let notifications = settings.notifications;
    let notifier = Arc::new(ChannelNotifier::new(
        notifications.email,
        notifications.sms,
        notifications.push,
    ));
    let dispatcher = Dispatcher::new(notifier, notifications.detached);

    let app_state = AppState {
        booking: BookingService::new(
            store.clone(),
            gateway.clone(),
            dispatcher.clone(),
            &settings.payment.currency,
            notifications.admin_push_target,
        ),
        reconciler: WebhookReconciler::new(
            store,
            gateway,
            dispatcher,
            settings.payment.webhook_secret,
            settings.payment.webhook_tolerance_secs,
        ),
    };

    let app = routes::create_router(app_state);

    let address = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Booking service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
