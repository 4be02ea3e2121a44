//! Shared key-value storage used by every part of the engine.
//!
//! The engine never assumes a particular storage technology: everything goes
//! through [`SharedStore`], a synchronous get/set interface over JSON values.
//! Typed access lives in [`StoreExt`], which decodes defensively: single
//! values fall back to the caller's default, and collections are decoded
//! entry by entry so one unreadable record never hides the others.

pub mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

pub use memory::{MemoryStore, NullStore};

pub mod keys {
    pub const ORDERS: &str = "dispatch.orders";
    pub const DRIVERS: &str = "dispatch.drivers";
    pub const SCHEDULED_ASSIGNMENTS: &str = "dispatch.scheduled_assignments";
    pub const ASSIGNMENTS: &str = "dispatch.assignments";
    pub const ACTIVITY: &str = "dispatch.activity";
    pub const NOTIFICATIONS: &str = "dispatch.notifications";
    pub const ORDER_SEQUENCE: &str = "dispatch.order_seq";
    pub const ORDER_SEQUENCE_LOCK: &str = "dispatch.order_seq.lock";

    /// Where unreadable entries of `key` are kept, raw.
    pub fn quarantine(key: &str) -> String {
        format!("{key}.quarantine")
    }
}

/// Emitted after a write so UI layers can re-read the keys that changed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreChange {
    pub keys: Vec<String>,
}

pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    fn remove(&self, key: &str);

    /// False when writes are not retained (degraded mode).
    fn is_persistent(&self) -> bool {
        true
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreChange>> {
        None
    }
}

pub trait StoreExt {
    fn get_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T;

    /// Decodes a JSON array entry by entry. Entries that do not decode are
    /// left out and copied raw under [`keys::quarantine`].
    fn get_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T>;

    fn put<T: Serialize>(&self, key: &str, value: &T);
}

impl<S: SharedStore + ?Sized> StoreExt for S {
    fn get_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.get(key) {
            Some(raw) => match serde_json::from_value(raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!(key, error = %err, "stored value could not be decoded; using fallback");
                    fallback
                }
            },
            None => fallback,
        }
    }

    fn get_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let items = match self.get(key) {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
        };

        let mut decoded = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();
        for item in items {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(value) => decoded.push(value),
                Err(err) => {
                    warn!(key, error = %err, "stored entry could not be decoded; quarantined");
                    rejected.push(item);
                }
            }
        }

        if !rejected.is_empty() {
            quarantine(self, key, rejected);
        }
        decoded
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(raw) => self.set(key, raw),
            Err(err) => warn!(key, error = %err, "value could not be encoded; write skipped"),
        }
    }
}

fn quarantine<S: SharedStore + ?Sized>(store: &S, key: &str, rejected: Vec<Value>) {
    let target = keys::quarantine(key);
    let mut kept = match store.get(&target) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    let before = kept.len();
    for item in rejected {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    if kept.len() != before {
        store.set(&target, Value::Array(kept));
    }
}

/// Raw `id` strings of the objects stored under `key`, readable or not.
pub fn raw_ids<S: SharedStore + ?Sized>(store: &S, key: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for source in [key.to_string(), keys::quarantine(key)] {
        if let Some(Value::Array(items)) = store.get(&source) {
            ids.extend(
                items
                    .iter()
                    .filter_map(|item| item.get("id")?.as_str().map(str::to_string)),
            );
        }
    }
    ids
}
