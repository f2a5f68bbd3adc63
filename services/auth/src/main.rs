use std::sync::Arc;

use anyhow::Result;
use tracing::info;

mod config;
mod error;
mod models;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod session_hash;
mod state;
mod validation;

#[cfg(test)]
mod testing;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    notifications::{ChannelNotifier, Dispatcher, PushConfig, SmsConfig},
};

use crate::{
    config::Settings, rate_limiter::RateLimiter, repositories::PgCredentialStore,
    session_hash::SessionHashService, state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init("auth-service");

    info!("Starting authentication service");

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

    let store = Arc::new(PgCredentialStore::new(pool));
    let notifier = Arc::new(ChannelNotifier::new(
        settings.notifications.email.clone(),
        SmsConfig::default(),
        PushConfig::default(),
    ));

    let app_state = AppState {
        store: store.clone(),
        session_hashes: SessionHashService::new(store, settings.session.ttl_minutes),
        rate_limiter: RateLimiter::new(settings.rate_limit.clone()),
        dispatcher: Dispatcher::new(notifier, settings.notifications.detached),
    };

    let app = routes::create_router(app_state);

    let address = settings.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Authentication service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
