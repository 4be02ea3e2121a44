use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::fold_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DriverStatus {
    Available,
    Paused,
    OnTrip,
    /// Also covers any spelling the dashboard does not know.
    Offline,
}

impl DriverStatus {
    pub fn normalize(raw: &str) -> Self {
        match fold_label(raw).as_str() {
            "available" | "disponible" | "dispo" | "libre" => DriverStatus::Available,
            "paused" | "pause" | "en pause" | "on break" => DriverStatus::Paused,
            "on trip" | "en course" | "busy" | "en livraison" | "in delivery" => {
                DriverStatus::OnTrip
            }
            _ => DriverStatus::Offline,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DriverStatus::Available => "AVAILABLE",
            DriverStatus::Paused => "PAUSED",
            DriverStatus::OnTrip => "ON_TRIP",
            DriverStatus::Offline => "OFFLINE",
        }
    }
}

impl From<String> for DriverStatus {
    fn from(raw: String) -> Self {
        DriverStatus::normalize(&raw)
    }
}

impl From<DriverStatus> for String {
    fn from(status: DriverStatus) -> Self {
        status.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DriverLifecycle {
    #[default]
    Active,
    Inactive,
    Suspended,
    Archived,
}

impl DriverLifecycle {
    pub fn normalize(raw: &str) -> Self {
        match fold_label(raw).as_str() {
            "active" | "actif" | "" => DriverLifecycle::Active,
            "suspended" | "suspendu" => DriverLifecycle::Suspended,
            "archived" | "archive" => DriverLifecycle::Archived,
            _ => DriverLifecycle::Inactive,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DriverLifecycle::Active => "ACTIVE",
            DriverLifecycle::Inactive => "INACTIVE",
            DriverLifecycle::Suspended => "SUSPENDED",
            DriverLifecycle::Archived => "ARCHIVED",
        }
    }
}

impl From<String> for DriverLifecycle {
    fn from(raw: String) -> Self {
        DriverLifecycle::normalize(&raw)
    }
}

impl From<DriverLifecycle> for String {
    fn from(lifecycle: DriverLifecycle) -> Self {
        lifecycle.label().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub status: DriverStatus,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub lifecycle_status: DriverLifecycle,
    /// Free text such as "800 kg", "3,5 t" or "20 m3".
    #[serde(default)]
    pub vehicle_capacity: String,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    pub fn is_active(&self) -> bool {
        self.active && self.lifecycle_status == DriverLifecycle::Active
    }
}

fn active_by_default() -> bool {
    true
}
