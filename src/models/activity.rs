use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    OrderCreated,
    OrderDuplicated,
    OrderStatusChanged,
    OrderCancelled,
    DriverAssigned,
    DriverReassigned,
    DriverUnassigned,
    AssignmentScheduled,
    ScheduledAssignmentCompleted,
    ScheduledAssignmentFailed,
    ScheduledAssignmentCancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub order_id: String,
    pub by: String,
    pub at: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    Admin,
    Client,
    Driver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub scope: NotificationScope,
    pub kind: ActivityKind,
    pub order_id: String,
    pub message: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}
