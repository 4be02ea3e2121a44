use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::WriteLock;
use crate::engine::audit::AuditLog;
use crate::engine::availability::{self, Availability};
use crate::engine::compatibility::{self, Compatibility, Requirements};
use crate::engine::orders::find_order_index;
use crate::error::AssignmentError;
use crate::models::activity::{ActivityKind, NotificationScope};
use crate::models::assignment::{
    Assignment, AssignmentOrigin, ScheduledAssignment, ScheduledStatus,
};
use crate::models::driver::Driver;
use crate::models::order::{Order, TimeWindow};
use crate::observability::metrics::Metrics;
use crate::store::{keys, SharedStore, StoreExt};

/// Result of promoting one scheduled assignment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Promotion {
    Completed { order: Order },
    Failed { reason: String },
    /// The entry had already left `PENDING`; nothing was touched.
    Skipped { status: ScheduledStatus },
}

/// Sole writer of order driver pointers and scheduled assignments.
///
/// Every read-validate-write sequence runs under the shared write lock, so
/// interactive calls and the scheduler sweep never interleave their updates.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn SharedStore>,
    audit: AuditLog,
    metrics: Metrics,
    writes: WriteLock,
    simulated_latency: Duration,
}

impl AssignmentService {
    pub fn new(
        store: Arc<dyn SharedStore>,
        audit: AuditLog,
        metrics: Metrics,
        writes: WriteLock,
        simulated_latency: Duration,
    ) -> Self {
        Self {
            store,
            audit,
            metrics,
            writes,
            simulated_latency,
        }
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.store.get_list(keys::DRIVERS)
    }

    pub fn scheduled_assignments(&self) -> Vec<ScheduledAssignment> {
        self.store.get_list(keys::SCHEDULED_ASSIGNMENTS)
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.store.get_list(keys::ASSIGNMENTS)
    }

    fn orders(&self) -> Vec<Order> {
        self.store.get_list(keys::ORDERS)
    }

    fn find_driver(&self, driver_id: &str) -> Result<Driver, AssignmentError> {
        self.drivers()
            .into_iter()
            .find(|driver| driver.id == driver_id)
            .ok_or_else(|| AssignmentError::DriverNotFound(driver_id.to_string()))
    }

    pub fn compatibility(
        &self,
        order_id: &str,
        driver_id: &str,
    ) -> Result<Compatibility, AssignmentError> {
        let orders = self.orders();
        let idx = find_order_index(&orders, order_id)
            .ok_or_else(|| AssignmentError::OrderNotFound(order_id.to_string()))?;
        let driver = self.find_driver(driver_id)?;

        Ok(compatibility::evaluate(&driver, &Requirements::for_order(&orders[idx])))
    }

    pub fn availability(&self, driver_id: &str, window: &TimeWindow) -> Availability {
        availability::is_assignable(
            driver_id,
            window,
            &self.scheduled_assignments(),
            &self.orders(),
            None,
        )
    }

    pub async fn assign_driver(
        &self,
        order_id: &str,
        driver_id: &str,
        by: &str,
    ) -> Result<Order, AssignmentError> {
        let _guard = self.writes.lock().await;
        let result = self.bind(order_id, driver_id, by, AssignmentOrigin::Manual, false).await;
        self.count("assign", &result);
        result
    }

    /// Like [`assign_driver`](Self::assign_driver), but rejects a no-op
    /// reassignment to the driver already on the order.
    pub async fn reassign_driver(
        &self,
        order_id: &str,
        driver_id: &str,
        by: &str,
    ) -> Result<Order, AssignmentError> {
        let _guard = self.writes.lock().await;
        let result = self.bind(order_id, driver_id, by, AssignmentOrigin::Manual, true).await;
        self.count("reassign", &result);
        result
    }

    pub async fn unassign_driver(&self, order_id: &str, by: &str) -> Result<Order, AssignmentError> {
        let _guard = self.writes.lock().await;

        let mut orders = self.orders();
        let idx = find_order_index(&orders, order_id)
            .ok_or_else(|| AssignmentError::OrderNotFound(order_id.to_string()))?;
        ensure_mutable(&orders[idx])?;

        let Some(previous) = orders[idx].driver_id.take() else {
            return Ok(orders[idx].clone());
        };
        orders[idx].assigned_at = None;
        let order = orders[idx].clone();
        let now = Utc::now();

        self.simulate_latency().await;
        self.store.put(keys::ORDERS, &orders);
        self.release_records(&order.id, now);

        self.audit.record(
            ActivityKind::DriverUnassigned,
            &order.id,
            by,
            format!("Chauffeur {previous} retiré de la commande {}", order.id),
            json!({ "driver_id": previous }),
        );
        self.audit.notify(
            NotificationScope::Driver,
            ActivityKind::DriverUnassigned,
            &order.id,
            format!("Vous n'êtes plus affecté à la commande {}", order.id),
        );

        self.metrics
            .assignments_total
            .with_label_values(&["unassign", "success"])
            .inc();
        info!(order_id = %order.id, driver_id = %previous, "driver unassigned");
        Ok(order)
    }

    pub async fn schedule_driver_assignment(
        &self,
        order_id: &str,
        driver_id: &str,
        execute_at: &str,
        by: &str,
    ) -> Result<ScheduledAssignment, AssignmentError> {
        let execute_at = DateTime::parse_from_rfc3339(execute_at.trim())
            .map(|at| at.with_timezone(&Utc))
            .map_err(|err| AssignmentError::InvalidExecuteAt(format!("{execute_at} ({err})")));

        let _guard = self.writes.lock().await;
        let result = match execute_at {
            Ok(execute_at) => self.schedule(order_id, driver_id, execute_at, by).await,
            Err(err) => Err(err),
        };
        self.count("schedule", &result);
        result
    }

    async fn schedule(
        &self,
        order_id: &str,
        driver_id: &str,
        execute_at: DateTime<Utc>,
        by: &str,
    ) -> Result<ScheduledAssignment, AssignmentError> {
        let orders = self.orders();
        let mut scheduled = self.scheduled_assignments();

        let idx = find_order_index(&orders, order_id)
            .ok_or_else(|| AssignmentError::OrderNotFound(order_id.to_string()))?;
        let order = &orders[idx];

        if scheduled
            .iter()
            .any(|entry| entry.is_pending() && entry.order_id == order.id)
        {
            return Err(AssignmentError::AlreadyScheduled(order.id.clone()));
        }

        let driver = self.validate(order, driver_id, &orders, &scheduled)?;

        let entry = ScheduledAssignment {
            id: Uuid::new_v4(),
            order_id: order.id.clone(),
            driver_id: driver.id.clone(),
            window: order.window,
            execute_at,
            created_at: Utc::now(),
            created_by: by.to_string(),
            status: ScheduledStatus::Pending,
            processed_at: None,
            failure_reason: None,
        };

        self.simulate_latency().await;
        scheduled.push(entry.clone());
        self.store.put(keys::SCHEDULED_ASSIGNMENTS, &scheduled);
        self.refresh_pending_gauge(&scheduled);

        self.audit.record(
            ActivityKind::AssignmentScheduled,
            &order.id,
            by,
            format!(
                "Affectation de {} programmée pour le {}",
                driver.name,
                execute_at.format("%d/%m/%Y %H:%M")
            ),
            json!({ "driver_id": driver.id, "scheduled_id": entry.id, "execute_at": execute_at }),
        );
        self.audit.notify(
            NotificationScope::Admin,
            ActivityKind::AssignmentScheduled,
            &order.id,
            format!("Affectation programmée pour la commande {}", order.id),
        );

        info!(
            order_id = %order.id,
            driver_id = %driver.id,
            execute_at = %execute_at,
            "assignment scheduled"
        );
        Ok(entry)
    }

    /// Applies one scheduled assignment, re-validating against the current
    /// state. Only `PENDING` entries are touched; anything else is skipped,
    /// so promoting twice is harmless.
    pub async fn promote_scheduled(
        &self,
        scheduled_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Promotion, AssignmentError> {
        let _guard = self.writes.lock().await;

        let entry = self
            .scheduled_assignments()
            .into_iter()
            .find(|entry| entry.id == scheduled_id)
            .ok_or_else(|| AssignmentError::ScheduledNotFound(scheduled_id.to_string()))?;

        if !entry.is_pending() {
            return Ok(Promotion::Skipped {
                status: entry.status,
            });
        }

        let applied = self.apply_scheduled(&entry).await;

        let (status, reason) = match &applied {
            Ok(_) => (ScheduledStatus::Completed, None),
            Err(err) => (ScheduledStatus::Failed, Some(err.to_string())),
        };

        let mut scheduled = self.scheduled_assignments();
        if let Some(stored) = scheduled.iter_mut().find(|stored| stored.id == scheduled_id) {
            stored.status = status;
            stored.processed_at = Some(now);
            stored.failure_reason = reason.clone();
        }
        self.store.put(keys::SCHEDULED_ASSIGNMENTS, &scheduled);
        self.refresh_pending_gauge(&scheduled);

        let meta = json!({ "driver_id": entry.driver_id, "scheduled_id": entry.id });
        match applied {
            Ok(order) => {
                let message = format!(
                    "Affectation programmée exécutée : {} sur {}",
                    entry.driver_id, entry.order_id
                );
                self.audit.record(
                    ActivityKind::ScheduledAssignmentCompleted,
                    &entry.order_id,
                    "scheduler",
                    message.clone(),
                    meta,
                );
                self.audit.notify(
                    NotificationScope::Admin,
                    ActivityKind::ScheduledAssignmentCompleted,
                    &entry.order_id,
                    message,
                );
                self.metrics
                    .scheduled_promotions_total
                    .with_label_values(&["completed"])
                    .inc();
                info!(scheduled_id = %entry.id, order_id = %entry.order_id, "scheduled assignment completed");
                Ok(Promotion::Completed { order })
            }
            Err(err) => {
                let reason = err.to_string();
                let message = format!(
                    "Affectation programmée échouée pour {} : {reason}",
                    entry.order_id
                );
                self.audit.record(
                    ActivityKind::ScheduledAssignmentFailed,
                    &entry.order_id,
                    "scheduler",
                    message.clone(),
                    meta,
                );
                self.audit.notify(
                    NotificationScope::Admin,
                    ActivityKind::ScheduledAssignmentFailed,
                    &entry.order_id,
                    message,
                );
                self.metrics
                    .scheduled_promotions_total
                    .with_label_values(&["failed"])
                    .inc();
                warn!(scheduled_id = %entry.id, order_id = %entry.order_id, reason = %reason, "scheduled assignment failed");
                Ok(Promotion::Failed { reason })
            }
        }
    }

    async fn apply_scheduled(&self, entry: &ScheduledAssignment) -> Result<Order, AssignmentError> {
        let orders = self.orders();
        let idx = find_order_index(&orders, &entry.order_id)
            .ok_or_else(|| AssignmentError::OrderNotFound(entry.order_id.clone()))?;

        match orders[idx].driver_id.as_deref() {
            Some(current) if current == entry.driver_id => return Ok(orders[idx].clone()),
            Some(current) => {
                return Err(AssignmentError::AlreadyAssigned {
                    order_id: orders[idx].id.clone(),
                    driver_id: current.to_string(),
                });
            }
            None => {}
        }

        let origin = AssignmentOrigin::Scheduled {
            scheduled_id: entry.id,
        };
        self.bind(&entry.order_id, &entry.driver_id, &entry.created_by, origin, false)
            .await
    }

    /// Points the order at `driver_id`, superseding any previous driver in a
    /// single write. Callers hold the write lock.
    async fn bind(
        &self,
        order_id: &str,
        driver_id: &str,
        by: &str,
        origin: AssignmentOrigin,
        reject_same_driver: bool,
    ) -> Result<Order, AssignmentError> {
        let mut orders = self.orders();
        let scheduled = self.scheduled_assignments();

        let idx = find_order_index(&orders, order_id)
            .ok_or_else(|| AssignmentError::OrderNotFound(order_id.to_string()))?;

        if orders[idx].driver_id.as_deref() == Some(driver_id) {
            ensure_mutable(&orders[idx])?;
            if reject_same_driver {
                return Err(AssignmentError::AlreadyAssigned {
                    order_id: orders[idx].id.clone(),
                    driver_id: driver_id.to_string(),
                });
            }
            return Ok(orders[idx].clone());
        }

        let driver = self.validate(&orders[idx], driver_id, &orders, &scheduled)?;

        let now = Utc::now();
        let previous = orders[idx].driver_id.replace(driver.id.clone());
        orders[idx].assigned_at = Some(now);
        let order = orders[idx].clone();

        self.simulate_latency().await;
        self.store.put(keys::ORDERS, &orders);

        if previous.is_some() {
            self.release_records(&order.id, now);
        }
        let mut records = self.assignments();
        records.push(Assignment {
            id: Uuid::new_v4(),
            order_id: order.id.clone(),
            driver_id: driver.id.clone(),
            origin,
            by: by.to_string(),
            assigned_at: now,
            released_at: None,
        });
        self.store.put(keys::ASSIGNMENTS, &records);

        let (kind, message) = match &previous {
            Some(previous) => (
                ActivityKind::DriverReassigned,
                format!(
                    "Commande {} réaffectée de {previous} à {}",
                    order.id, driver.name
                ),
            ),
            None => (
                ActivityKind::DriverAssigned,
                format!("Commande {} affectée à {}", order.id, driver.name),
            ),
        };
        self.audit.record(
            kind,
            &order.id,
            by,
            message,
            json!({ "driver_id": driver.id, "previous_driver_id": previous }),
        );
        self.audit.notify(
            NotificationScope::Driver,
            kind,
            &order.id,
            format!("Nouvelle course : commande {}", order.id),
        );

        info!(
            order_id = %order.id,
            driver_id = %driver.id,
            previous_driver_id = ?previous,
            "driver assigned"
        );
        Ok(order)
    }

    /// Terminal status, compatibility, then availability over the order's
    /// window. Returns the driver on success.
    fn validate(
        &self,
        order: &Order,
        driver_id: &str,
        orders: &[Order],
        scheduled: &[ScheduledAssignment],
    ) -> Result<Driver, AssignmentError> {
        ensure_mutable(order)?;

        let driver = self.find_driver(driver_id)?;

        let verdict = compatibility::evaluate(&driver, &Requirements::for_order(order));
        if let Some(reason) = verdict.reasons.first() {
            return Err(AssignmentError::Incompatible(reason.clone()));
        }
        for warning in &verdict.warnings {
            warn!(order_id = %order.id, driver_id = %driver.id, warning = %warning, "assignment warning");
        }

        let availability =
            availability::is_assignable(&driver.id, &order.window, scheduled, orders, Some(&order.id));
        if let Some(conflict) = availability.conflict {
            return Err(AssignmentError::Unavailable(conflict.describe()));
        }

        Ok(driver)
    }

    fn release_records(&self, order_id: &str, at: DateTime<Utc>) {
        let mut records = self.assignments();
        let mut touched = false;
        for record in records
            .iter_mut()
            .filter(|record| record.order_id == order_id && record.released_at.is_none())
        {
            record.released_at = Some(at);
            touched = true;
        }
        if touched {
            self.store.put(keys::ASSIGNMENTS, &records);
        }
    }

    fn refresh_pending_gauge(&self, scheduled: &[ScheduledAssignment]) {
        let pending = scheduled.iter().filter(|entry| entry.is_pending()).count();
        self.metrics.scheduled_pending.set(pending as i64);
    }

    fn count<T>(&self, operation: &str, result: &Result<T, AssignmentError>) {
        let outcome = if result.is_ok() { "success" } else { "rejected" };
        self.metrics
            .assignments_total
            .with_label_values(&[operation, outcome])
            .inc();

        if let Err(err) = result {
            warn!(operation, reason = %err, "assignment rejected");
        }
    }

    async fn simulate_latency(&self) {
        if !self.simulated_latency.is_zero() {
            sleep(self.simulated_latency).await;
        }
    }
}

fn ensure_mutable(order: &Order) -> Result<(), AssignmentError> {
    if order.status.is_terminal() {
        return Err(AssignmentError::ReadOnlyOrder {
            order_id: order.id.clone(),
            status: order.status.label().to_string(),
        });
    }
    Ok(())
}
