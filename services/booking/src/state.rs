//! Application state shared across handlers

use crate::{booking::BookingService, webhook::WebhookReconciler};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub booking: BookingService,
    pub reconciler: WebhookReconciler,
}
