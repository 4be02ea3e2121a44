//! Human-readable order numbers (`ORD-001`, `ORD-002`, ...).
//!
//! The counter lives in the shared store and is advanced under the
//! cooperative [`StorageLock`]. The lock only narrows races; uniqueness comes
//! from re-checking the live order list before a number is committed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::LockConfig;
use crate::engine::lock::StorageLock;
use crate::error::SequenceError;
use crate::models::assignment::{Assignment, ScheduledAssignment};
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::store::{keys, raw_ids, SharedStore, StoreExt};

pub const ORDER_PREFIX: &str = "ORD-";

/// Numbers at or above this bound are treated as malformed, which keeps
/// every counter increment far from `u64` overflow.
pub const MAX_ORDER_NUMBER: u64 = 1_000_000_000_000_000_000;

pub fn format_order_number(number: u64) -> String {
    format!("{ORDER_PREFIX}{number:03}")
}

/// Accepts `ORD-012`, `ord-12`, `ORD12`, `ORD_12` and bare `12`.
pub fn parse_order_number(raw: &str) -> Option<u64> {
    let upper = raw.trim().to_ascii_uppercase();
    let digits = match upper.strip_prefix("ORD") {
        Some(rest) => rest.strip_prefix(['-', '_', ' ']).unwrap_or(rest),
        None => upper.as_str(),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0 && *n < MAX_ORDER_NUMBER)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub renamed: Vec<Rename>,
    pub counter: u64,
}

#[derive(Clone)]
pub struct SequenceGenerator {
    store: Arc<dyn SharedStore>,
    lock: StorageLock,
    metrics: Metrics,
}

impl SequenceGenerator {
    pub fn new(store: Arc<dyn SharedStore>, lock_config: LockConfig, metrics: Metrics) -> Self {
        let lock = StorageLock::new(store.clone(), keys::ORDER_SEQUENCE_LOCK, lock_config);
        Self {
            store,
            lock,
            metrics,
        }
    }

    /// Seeds the counter from existing orders. No-op once a counter exists.
    pub fn init_counter(&self) -> u64 {
        if let Some(counter) = self.stored_counter() {
            return counter;
        }

        let seed = self.used_numbers().last().copied().unwrap_or(0);
        self.store.put(keys::ORDER_SEQUENCE, &seed);
        info!(seed, "order counter seeded from existing orders");
        seed
    }

    /// Rewrites non-canonical order ids in place.
    ///
    /// Ids that cannot be parsed, or that collide with an order already kept,
    /// receive fresh numbers above the current maximum. References held by
    /// scheduled assignments and assignment records follow the rename when
    /// the old id was unambiguous.
    ///
    /// Rewrites the order collections; go through
    /// [`OrderDesk::reconcile_order_numbers`](crate::engine::orders::OrderDesk::reconcile_order_numbers)
    /// when other writers share the store.
    pub async fn reconcile(&self) -> ReconcileReport {
        let _guard = self.lock.acquire().await;

        let mut orders: Vec<Order> = self.store.get_list(keys::ORDERS);
        let mut kept: HashSet<u64> = HashSet::new();
        let mut renumber: Vec<usize> = Vec::new();
        let mut renamed: Vec<Rename> = Vec::new();

        for (idx, order) in orders.iter_mut().enumerate() {
            match parse_order_number(&order.id) {
                Some(number) if kept.insert(number) => {
                    let canonical = format_order_number(number);
                    if canonical != order.id {
                        renamed.push(Rename {
                            from: std::mem::replace(&mut order.id, canonical.clone()),
                            to: canonical,
                        });
                    }
                }
                _ => renumber.push(idx),
            }
        }

        // quarantined orders keep their numbers reserved
        let mut next = kept
            .iter()
            .copied()
            .chain(self.used_numbers().last().copied())
            .max()
            .unwrap_or(0)
            .max(self.current_counter());
        for idx in renumber {
            next += 1;
            let canonical = format_order_number(next);
            renamed.push(Rename {
                from: std::mem::replace(&mut orders[idx].id, canonical.clone()),
                to: canonical,
            });
        }

        let counter = next.max(self.stored_counter().unwrap_or(0));

        if !renamed.is_empty() {
            self.store.put(keys::ORDERS, &orders);
            self.rewrite_references(&renamed);
            warn!(count = renamed.len(), "normalized legacy order ids");
        }
        self.store.put(keys::ORDER_SEQUENCE, &counter);

        ReconcileReport { renamed, counter }
    }

    fn rewrite_references(&self, renamed: &[Rename]) {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for rename in renamed {
            *occurrences.entry(rename.from.as_str()).or_default() += 1;
        }
        let mapping: HashMap<&str, &str> = renamed
            .iter()
            .filter(|rename| occurrences.get(rename.from.as_str()) == Some(&1))
            .map(|rename| (rename.from.as_str(), rename.to.as_str()))
            .collect();

        let mut scheduled: Vec<ScheduledAssignment> =
            self.store.get_list(keys::SCHEDULED_ASSIGNMENTS);
        let mut touched = false;
        for entry in scheduled.iter_mut() {
            if let Some(to) = mapping.get(entry.order_id.as_str()) {
                entry.order_id = to.to_string();
                touched = true;
            }
        }
        if touched {
            self.store.put(keys::SCHEDULED_ASSIGNMENTS, &scheduled);
        }

        let mut assignments: Vec<Assignment> = self.store.get_list(keys::ASSIGNMENTS);
        let mut touched = false;
        for record in assignments.iter_mut() {
            if let Some(to) = mapping.get(record.order_id.as_str()) {
                record.order_id = to.to_string();
                touched = true;
            }
        }
        if touched {
            self.store.put(keys::ASSIGNMENTS, &assignments);
        }
    }

    pub async fn next_order_number(&self) -> String {
        if !self.store.is_persistent() {
            warn!("no persistent storage; order numbers are not durable");
        }

        let guard = self.lock.acquire().await;

        let number = self.first_free_after(self.current_counter());
        self.store.put(keys::ORDER_SEQUENCE, &number);

        drop(guard);

        self.metrics.order_numbers_issued_total.inc();
        let id = format_order_number(number);
        info!(order_id = %id, "order number issued");
        id
    }

    /// Same number `next_order_number` would return now, without consuming it.
    pub fn preview_next_order_number(&self) -> String {
        format_order_number(self.first_free_after(self.current_counter()))
    }

    /// Returns the canonical form of `id` when it is well formed and unused.
    pub fn assert_unique(&self, id: &str) -> Result<String, SequenceError> {
        let number =
            parse_order_number(id).ok_or_else(|| SequenceError::Malformed(id.to_string()))?;
        let canonical = format_order_number(number);

        if self.used_numbers().contains(&number) {
            return Err(SequenceError::AlreadyUsed(canonical));
        }

        Ok(canonical)
    }

    fn stored_counter(&self) -> Option<u64> {
        let counter: Option<u64> = self.store.get_or(keys::ORDER_SEQUENCE, None);
        counter.map(|counter| counter.min(MAX_ORDER_NUMBER))
    }

    fn current_counter(&self) -> u64 {
        self.stored_counter()
            .unwrap_or_else(|| self.used_numbers().last().copied().unwrap_or(0))
    }

    fn first_free_after(&self, counter: u64) -> u64 {
        let used = self.used_numbers();
        let mut candidate = counter.saturating_add(1);
        while used.contains(&candidate) {
            candidate = candidate.saturating_add(1);
        }
        candidate
    }

    /// Numbers held by stored orders, including entries too damaged to decode.
    fn used_numbers(&self) -> BTreeSet<u64> {
        raw_ids(self.store.as_ref(), keys::ORDERS)
            .iter()
            .filter_map(|id| parse_order_number(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{format_order_number, parse_order_number, MAX_ORDER_NUMBER};

    #[test]
    fn formats_with_three_digit_minimum() {
        assert_eq!(format_order_number(7), "ORD-007");
        assert_eq!(format_order_number(42), "ORD-042");
        assert_eq!(format_order_number(1234), "ORD-1234");
    }

    #[test]
    fn parses_canonical_and_legacy_forms() {
        assert_eq!(parse_order_number("ORD-012"), Some(12));
        assert_eq!(parse_order_number(" ord-12 "), Some(12));
        assert_eq!(parse_order_number("ORD12"), Some(12));
        assert_eq!(parse_order_number("ORD_5"), Some(5));
        assert_eq!(parse_order_number("17"), Some(17));
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in [
            "",
            "ORD-",
            "ORD-12a",
            "CMD-12",
            "ORD-000",
            "-3",
            "ORD--4",
            "ORD-18446744073709551615",
            "ORD-99999999999999999999",
        ] {
            assert_eq!(parse_order_number(raw), None, "{raw}");
        }
    }

    #[test]
    fn largest_accepted_number_still_has_a_successor() {
        let largest = format_order_number(MAX_ORDER_NUMBER - 1);
        assert_eq!(parse_order_number(&largest), Some(MAX_ORDER_NUMBER - 1));
        assert_eq!(parse_order_number(&format_order_number(MAX_ORDER_NUMBER)), None);
    }
}
