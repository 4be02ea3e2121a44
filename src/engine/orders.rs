use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::engine::WriteLock;
use crate::engine::audit::AuditLog;
use crate::engine::sequence::{parse_order_number, ReconcileReport, SequenceGenerator};
use crate::error::OrderError;
use crate::models::activity::{ActivityKind, NotificationScope};
use crate::models::assignment::{ScheduledAssignment, ScheduledStatus};
use crate::models::order::{Order, OrderStatus, TimeWindow};
use crate::observability::metrics::Metrics;
use crate::store::{keys, SharedStore, StoreExt};

/// Position of `id` in `orders`, matching legacy spellings of the same number.
pub fn find_order_index(orders: &[Order], id: &str) -> Option<usize> {
    orders.iter().position(|order| order.id == id).or_else(|| {
        let wanted = parse_order_number(id)?;
        orders
            .iter()
            .position(|order| parse_order_number(&order.id) == Some(wanted))
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    /// Caller-chosen number; one is issued when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub weight_kg: f64,
    #[serde(default)]
    pub volume_m3: f64,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub window: TimeWindow,
    #[serde(default)]
    pub express: bool,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub temperature_controlled: bool,
    #[serde(default)]
    pub excluded_driver_ids: Vec<String>,
}

/// Order-creation boundary: validation, numbering, duplication and status
/// transitions. Driver pointers are left to the assignment service.
#[derive(Clone)]
pub struct OrderDesk {
    store: Arc<dyn SharedStore>,
    sequence: SequenceGenerator,
    audit: AuditLog,
    metrics: Metrics,
    writes: WriteLock,
}

impl OrderDesk {
    pub fn new(
        store: Arc<dyn SharedStore>,
        sequence: SequenceGenerator,
        audit: AuditLog,
        metrics: Metrics,
        writes: WriteLock,
    ) -> Self {
        Self {
            store,
            sequence,
            audit,
            metrics,
            writes,
        }
    }

    pub fn list(&self) -> Vec<Order> {
        self.store.get_list(keys::ORDERS)
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        let orders = self.list();
        find_order_index(&orders, id).map(|idx| orders[idx].clone())
    }

    pub async fn create_order(&self, new_order: NewOrder, by: &str) -> Result<Order, OrderError> {
        validate(&new_order)?;

        let _guard = self.writes.lock().await;

        let id = match new_order.id.as_deref() {
            Some(raw) => self.sequence.assert_unique(raw)?,
            None => self.sequence.next_order_number().await,
        };

        let order = Order {
            id,
            client_id: new_order.client_id.trim().to_string(),
            sector: new_order.sector,
            weight_kg: new_order.weight_kg,
            volume_m3: new_order.volume_m3,
            pickup_address: new_order.pickup_address,
            dropoff_address: new_order.dropoff_address,
            window: new_order.window,
            status: OrderStatus::Pending,
            driver_id: None,
            assigned_at: None,
            express: new_order.express,
            fragile: new_order.fragile,
            temperature_controlled: new_order.temperature_controlled,
            excluded_driver_ids: new_order.excluded_driver_ids,
            created_at: Utc::now(),
        };

        let mut orders = self.list();
        orders.push(order.clone());
        self.store.put(keys::ORDERS, &orders);

        self.audit.record(
            ActivityKind::OrderCreated,
            &order.id,
            by,
            format!("Commande {} créée", order.id),
            json!({ "client_id": order.client_id }),
        );
        self.audit.notify(
            NotificationScope::Admin,
            ActivityKind::OrderCreated,
            &order.id,
            format!("Nouvelle commande {}", order.id),
        );

        info!(order_id = %order.id, client_id = %order.client_id, "order created");
        Ok(order)
    }

    /// Copies an order under a fresh number, pending and without driver.
    pub async fn duplicate_order(&self, order_id: &str, by: &str) -> Result<Order, OrderError> {
        let _guard = self.writes.lock().await;

        let mut orders = self.list();
        let source = find_order_index(&orders, order_id)
            .map(|idx| orders[idx].clone())
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        let copy = Order {
            id: self.sequence.next_order_number().await,
            status: OrderStatus::Pending,
            driver_id: None,
            assigned_at: None,
            created_at: Utc::now(),
            ..source.clone()
        };

        orders.push(copy.clone());
        self.store.put(keys::ORDERS, &orders);

        self.audit.record(
            ActivityKind::OrderDuplicated,
            &copy.id,
            by,
            format!("Commande {} dupliquée depuis {}", copy.id, source.id),
            json!({ "source_order_id": source.id }),
        );

        info!(order_id = %copy.id, source_order_id = %source.id, "order duplicated");
        Ok(copy)
    }

    /// Renumbers legacy order ids while no other order write is in flight.
    pub async fn reconcile_order_numbers(&self) -> ReconcileReport {
        let _guard = self.writes.lock().await;
        self.sequence.reconcile().await
    }

    /// Delivered and cancelled are final. Entering either one cancels the
    /// order's pending scheduled assignments.
    pub async fn set_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        by: &str,
    ) -> Result<Order, OrderError> {
        let _guard = self.writes.lock().await;

        let mut orders = self.list();
        let idx = find_order_index(&orders, order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        let previous = orders[idx].status;
        if previous == status {
            return Ok(orders[idx].clone());
        }
        if previous.is_terminal() {
            return Err(OrderError::InvalidTransition {
                from: previous.label().to_string(),
                to: status.label().to_string(),
            });
        }

        orders[idx].status = status;
        let order = orders[idx].clone();
        self.store.put(keys::ORDERS, &orders);

        if status.is_terminal() {
            self.cancel_pending_schedules(&order, by, Utc::now());
        }

        let meta = json!({ "from": previous.label(), "to": status.label() });
        if status == OrderStatus::Cancelled {
            let message = format!("Commande {} annulée", order.id);
            self.audit
                .record(ActivityKind::OrderCancelled, &order.id, by, message.clone(), meta);
            self.audit.notify(
                NotificationScope::Client,
                ActivityKind::OrderCancelled,
                &order.id,
                message,
            );
        } else {
            self.audit.record(
                ActivityKind::OrderStatusChanged,
                &order.id,
                by,
                format!("Commande {} : {} → {}", order.id, previous, status),
                meta,
            );
        }

        info!(order_id = %order.id, from = %previous, to = %status, "order status changed");
        Ok(order)
    }

    fn cancel_pending_schedules(&self, order: &Order, by: &str, now: DateTime<Utc>) {
        let mut scheduled: Vec<ScheduledAssignment> =
            self.store.get_list(keys::SCHEDULED_ASSIGNMENTS);
        let reason = format!("Commande {} passée au statut {}", order.id, order.status);

        let mut cancelled = Vec::new();
        for entry in scheduled
            .iter_mut()
            .filter(|entry| entry.is_pending() && entry.order_id == order.id)
        {
            entry.status = ScheduledStatus::Cancelled;
            entry.processed_at = Some(now);
            entry.failure_reason = Some(reason.clone());
            cancelled.push(entry.clone());
        }
        if cancelled.is_empty() {
            return;
        }

        self.store.put(keys::SCHEDULED_ASSIGNMENTS, &scheduled);
        let pending = scheduled.iter().filter(|entry| entry.is_pending()).count();
        self.metrics.scheduled_pending.set(pending as i64);

        for entry in cancelled {
            self.audit.record(
                ActivityKind::ScheduledAssignmentCancelled,
                &order.id,
                by,
                format!("Affectation programmée de {} annulée : {reason}", entry.driver_id),
                json!({ "driver_id": entry.driver_id, "scheduled_id": entry.id }),
            );
            info!(scheduled_id = %entry.id, order_id = %order.id, "scheduled assignment cancelled");
        }
    }
}

fn validate(new_order: &NewOrder) -> Result<(), OrderError> {
    check_quantity("poids", new_order.weight_kg)?;
    check_quantity("volume", new_order.volume_m3)?;

    if new_order.client_id.trim().is_empty() {
        return Err(OrderError::InvalidField {
            field: "client",
            reason: "ne peut pas être vide".to_string(),
        });
    }
    if new_order.pickup_address.trim().is_empty() || new_order.dropoff_address.trim().is_empty() {
        return Err(OrderError::InvalidField {
            field: "adresse",
            reason: "enlèvement et livraison sont obligatoires".to_string(),
        });
    }
    if new_order.window.start >= new_order.window.end {
        return Err(OrderError::InvalidWindow);
    }

    Ok(())
}

fn check_quantity(field: &'static str, value: f64) -> Result<(), OrderError> {
    if !value.is_finite() || value < 0.0 {
        return Err(OrderError::InvalidField {
            field,
            reason: format!("{value} n'est pas une quantité positive"),
        });
    }
    Ok(())
}
