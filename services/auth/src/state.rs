//! Application state shared across handlers

use std::sync::Arc;

use common::notifications::Dispatcher;

use crate::{
    rate_limiter::RateLimiter, repositories::CredentialStore, session_hash::SessionHashService,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub session_hashes: SessionHashService,
    pub rate_limiter: RateLimiter,
    pub dispatcher: Dispatcher,
}
