//! Professional model and related functionality

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::service::NewService;

/// Whether a professional can still be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfessionalStatus {
    Active,
    Inactive,
}

impl ProfessionalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfessionalStatus::Active => "active",
            ProfessionalStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ProfessionalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfessionalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProfessionalStatus::Active),
            "inactive" => Ok(ProfessionalStatus::Inactive),
            other => Err(format!("unknown professional status: {}", other)),
        }
    }
}

/// Opening hours for one weekday; `weekday` is 0 (Sunday) to 6 (Saturday)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHours {
    pub weekday: i16,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Professional entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Professional {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country_code: String,
    pub push_target: Option<String>,
    pub available: bool,
    pub status: ProfessionalStatus,
    pub working_hours: Vec<WorkingHours>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Professional {
    /// Phone number in international form, as SMS providers expect it
    pub fn phone_number(&self) -> String {
        format!("{}{}", self.country_code, self.phone)
    }
}

/// Professional registration payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfessional {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    pub push_target: Option<String>,
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
    #[serde(default)]
    pub services: Vec<NewService>,
}

fn default_country_code() -> String {
    "+55".to_string()
}

impl NewProfessional {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if !self.email.contains('@') {
            return Err("a valid email is required".to_string());
        }
        if self.phone.trim().is_empty() {
            return Err("phone is required".to_string());
        }

        let mut seen = [false; 7];
        for hours in &self.working_hours {
            let Some(slot) = usize::try_from(hours.weekday).ok().filter(|d| *d < 7) else {
                return Err(format!("invalid weekday: {}", hours.weekday));
            };
            if seen[slot] {
                return Err(format!("duplicate working hours for weekday {}", hours.weekday));
            }
            seen[slot] = true;
            if hours.start >= hours.end {
                return Err(format!(
                    "working hours for weekday {} must start before they end",
                    hours.weekday
                ));
            }
        }

        for service in &self.services {
            service.validate()?;
        }

        Ok(())
    }
}
