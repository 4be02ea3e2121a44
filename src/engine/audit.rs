use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::models::activity::{ActivityEntry, ActivityKind, Notification, NotificationScope};
use crate::store::{keys, SharedStore, StoreExt};

/// Append-only activity log and notification feed.
///
/// Appends and `mark_read` rewrite a whole store key; callers hold the
/// shared write lock.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn SharedStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub fn record(
        &self,
        kind: ActivityKind,
        order_id: &str,
        by: &str,
        message: impl Into<String>,
        meta: Value,
    ) -> ActivityEntry {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            kind,
            order_id: order_id.to_string(),
            by: by.to_string(),
            at: Utc::now(),
            message: message.into(),
            meta,
        };

        let mut log: Vec<ActivityEntry> = self.store.get_list(keys::ACTIVITY);
        log.push(entry.clone());
        self.store.put(keys::ACTIVITY, &log);
        entry
    }

    pub fn notify(
        &self,
        scope: NotificationScope,
        kind: ActivityKind,
        order_id: &str,
        message: impl Into<String>,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            scope,
            kind,
            order_id: order_id.to_string(),
            message: message.into(),
            at: Utc::now(),
            read: false,
        };

        let mut feed: Vec<Notification> = self.store.get_list(keys::NOTIFICATIONS);
        feed.push(notification.clone());
        self.store.put(keys::NOTIFICATIONS, &feed);
        notification
    }

    /// Entries for one order, or the whole log when `order_id` is `None`.
    pub fn activity(&self, order_id: Option<&str>) -> Vec<ActivityEntry> {
        let log: Vec<ActivityEntry> = self.store.get_list(keys::ACTIVITY);
        match order_id {
            Some(order_id) => log.into_iter().filter(|e| e.order_id == order_id).collect(),
            None => log,
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.store.get_list(keys::NOTIFICATIONS)
    }

    pub fn mark_read(&self, id: Uuid) -> Option<Notification> {
        let mut feed: Vec<Notification> = self.store.get_list(keys::NOTIFICATIONS);
        let notification = feed.iter_mut().find(|n| n.id == id)?;

        if !notification.read {
            notification.read = true;
            let updated = notification.clone();
            self.store.put(keys::NOTIFICATIONS, &feed);
            return Some(updated);
        }

        Some(notification.clone())
    }
}
