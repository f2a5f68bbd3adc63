//! Service model: something a professional offers at a price

use serde::{Deserialize, Serialize};

/// Service entity; prices are in minor currency units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i64,
    pub professional_id: i64,
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub active: bool,
}

/// New service creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewService {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("service name is required".to_string());
        }
        if self.duration_minutes <= 0 {
            return Err(format!("service {} needs a positive duration", self.name));
        }
        if self.price_cents < 0 {
            return Err(format!("service {} cannot have a negative price", self.name));
        }
        Ok(())
    }
}

/// Total price of a selection of services
pub fn total_price(services: &[Service]) -> i64 {
    services.iter().map(|s| s.price_cents).sum()
}
