use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::models::assignment::ScheduledAssignment;
use crate::models::order::{Order, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSource {
    Scheduled,
    ActiveOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub source: ConflictSource,
    pub order_id: String,
    pub scheduled_id: Option<Uuid>,
    pub window: TimeWindow,
}

impl Conflict {
    pub fn describe(&self) -> String {
        let what = match self.source {
            ConflictSource::Scheduled => "affectation programmée",
            ConflictSource::ActiveOrder => "commande en cours",
        };
        format!(
            "Chauffeur indisponible sur ce créneau : {what} {} du {} au {}",
            self.order_id,
            self.window.start.format("%d/%m/%Y %H:%M"),
            self.window.end.format("%d/%m/%Y %H:%M"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub assignable: bool,
    pub conflict: Option<Conflict>,
}

/// Checks `candidate` against the driver's pending scheduled assignments and
/// live orders. Bookings of `ignore_order` are skipped so an order never
/// conflicts with itself during reassignment or promotion. Pending entries
/// whose order is delivered or cancelled hold no time.
///
/// When several bookings overlap, the one starting earliest is reported.
pub fn is_assignable(
    driver_id: &str,
    candidate: &TimeWindow,
    scheduled: &[ScheduledAssignment],
    orders: &[Order],
    ignore_order: Option<&str>,
) -> Availability {
    let ignored = |order_id: &str| ignore_order.is_some_and(|skip| skip == order_id);
    let closed: HashSet<&str> = orders
        .iter()
        .filter(|order| order.status.is_terminal())
        .map(|order| order.id.as_str())
        .collect();

    let from_scheduled = scheduled
        .iter()
        .filter(|entry| entry.is_pending() && entry.driver_id == driver_id)
        .filter(|entry| !ignored(entry.order_id.as_str()))
        .filter(|entry| !closed.contains(entry.order_id.as_str()))
        .map(|entry| Conflict {
            source: ConflictSource::Scheduled,
            order_id: entry.order_id.clone(),
            scheduled_id: Some(entry.id),
            window: entry.window,
        });

    let from_orders = orders
        .iter()
        .filter(|order| order.occupies_driver(driver_id))
        .filter(|order| !ignored(order.id.as_str()))
        .map(|order| Conflict {
            source: ConflictSource::ActiveOrder,
            order_id: order.id.clone(),
            scheduled_id: None,
            window: order.window,
        });

    let conflict = from_scheduled
        .chain(from_orders)
        .filter(|booking| booking.window.overlaps(candidate))
        .min_by_key(|booking| booking.window.start);

    Availability {
        assignable: conflict.is_none(),
        conflict,
    }
}
