use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::TimeWindow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentOrigin {
    Manual,
    Scheduled { scheduled_id: Uuid },
}

/// Historical record of a driver bound to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: String,
    pub driver_id: String,
    pub origin: AssignmentOrigin,
    pub by: String,
    pub assigned_at: DateTime<Utc>,
    /// Set once the driver is unassigned or superseded.
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "failed")]
    Failed,
    #[serde(alias = "cancelled", alias = "canceled")]
    Cancelled,
}

impl std::fmt::Display for ScheduledStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduledStatus::Pending => write!(f, "PENDING"),
            ScheduledStatus::Completed => write!(f, "COMPLETED"),
            ScheduledStatus::Failed => write!(f, "FAILED"),
            ScheduledStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Deferred assignment, promoted by the sweep once `execute_at` is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledAssignment {
    pub id: Uuid,
    pub order_id: String,
    pub driver_id: String,
    pub window: TimeWindow,
    pub execute_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    pub status: ScheduledStatus,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl ScheduledAssignment {
    pub fn is_pending(&self) -> bool {
        self.status == ScheduledStatus::Pending
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.execute_at <= now
    }
}
