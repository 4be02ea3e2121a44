use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::fold_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Maps every spelling found in stored data to one status.
    pub fn normalize(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "en attente" | "attente" | "pending" | "nouvelle" | "new" => Some(OrderStatus::Pending),
            "en cours" | "in progress" | "assignee" | "assigned" | "en livraison" | "picked up" => {
                Some(OrderStatus::InProgress)
            }
            "livree" | "livre" | "delivered" | "terminee" | "completed" => {
                Some(OrderStatus::Delivered)
            }
            "annulee" | "annule" | "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "En attente",
            OrderStatus::InProgress => "En cours",
            OrderStatus::Delivered => "Livrée",
            OrderStatus::Cancelled => "Annulée",
        }
    }

    /// Delivered and cancelled orders are read-only for assignment purposes.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        OrderStatus::normalize(&raw).ok_or_else(|| format!("unknown order status '{raw}'"))
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.label().to_string()
    }
}

/// Booking interval, half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Touching windows (`self.end == other.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub weight_kg: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub volume_m3: f64,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub window: TimeWindow,
    pub status: OrderStatus,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub express: bool,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub temperature_controlled: bool,
    /// Drivers barred from this order.
    #[serde(default)]
    pub excluded_driver_ids: Vec<String>,
    /// Older records carry no creation time; they read as created now.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// An order holds its driver's time only while it is still live.
    pub fn occupies_driver(&self, driver_id: &str) -> bool {
        !self.status.is_terminal() && self.driver_id.as_deref() == Some(driver_id)
    }
}

/// Quantities typed by hand upstream may arrive as strings ("2,5") or junk;
/// anything that is not a number reads as 0.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let value = match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{Order, OrderStatus, TimeWindow};

    fn at(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn status_aliases_normalize_to_one_variant() {
        for raw in ["En attente", "EN_ATTENTE", "pending", "en-attente"] {
            assert_eq!(OrderStatus::normalize(raw), Some(OrderStatus::Pending), "{raw}");
        }
        assert_eq!(OrderStatus::normalize("Livrée"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::normalize("LIVREE"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::normalize("canceled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::normalize("lost"), None);
    }

    #[test]
    fn status_serializes_as_canonical_label() {
        let value = serde_json::to_value(OrderStatus::Cancelled).unwrap();
        assert_eq!(value, json!("Annulée"));
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        let booked = TimeWindow::new(at(10, 0), at(11, 0));
        assert!(!booked.overlaps(&TimeWindow::new(at(11, 0), at(12, 0))));
        assert!(!booked.overlaps(&TimeWindow::new(at(9, 0), at(10, 0))));
        assert!(booked.overlaps(&TimeWindow::new(at(10, 30), at(11, 30))));
        assert!(booked.overlaps(&TimeWindow::new(at(10, 15), at(10, 45))));
    }

    #[test]
    fn order_reads_legacy_quantities_and_status_spellings() {
        let order: Order = serde_json::from_value(json!({
            "id": "ORD-007",
            "client_id": "CLI-1",
            "weight_kg": "12,5",
            "volume_m3": "n/a",
            "pickup_address": "1 rue A",
            "dropoff_address": "2 rue B",
            "window": { "start": "2025-01-15T10:00:00Z", "end": "2025-01-15T11:00:00Z" },
            "status": "EN ATTENTE",
            "created_at": "2025-01-14T08:00:00Z"
        }))
        .unwrap();

        assert_eq!(order.weight_kg, 12.5);
        assert_eq!(order.volume_m3, 0.0);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.driver_id.is_none());
        assert!(order.excluded_driver_ids.is_empty());
    }
}
