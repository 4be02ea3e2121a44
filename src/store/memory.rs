use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use super::{SharedStore, StoreChange};

/// Process-local store backed by a concurrent map.
pub struct MemoryStore {
    entries: DashMap<String, Value>,
    changes_tx: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (changes_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            entries: DashMap::new(),
            changes_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn notify(&self, key: &str) {
        let _ = self.changes_tx.send(StoreChange {
            keys: vec![key.to_string()],
        });
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
        self.notify(key);
    }

    fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.notify(key);
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<StoreChange>> {
        Some(self.changes_tx.subscribe())
    }
}

/// Stand-in used when no persistent storage is available.
///
/// Reads always miss and writes are dropped; the first dropped write logs a
/// warning so the degraded mode is visible without flooding the logs.
#[derive(Default)]
pub struct NullStore {
    warned: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedStore for NullStore {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, key: &str, _value: Value) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(key, "no persistent storage available; writes are not retained");
        }
    }

    fn remove(&self, _key: &str) {}

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MemoryStore, NullStore};
    use crate::store::SharedStore;

    #[tokio::test]
    async fn memory_store_notifies_subscribers_of_changed_keys() {
        let store = MemoryStore::new(8);
        let mut rx = store.subscribe().unwrap();

        store.set("dispatch.orders", json!([]));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.keys, vec!["dispatch.orders".to_string()]);
    }

    #[test]
    fn removing_missing_key_is_silent() {
        let store = MemoryStore::new(8);
        let mut rx = store.subscribe().unwrap();
        store.remove("absent");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn null_store_drops_writes() {
        let store = NullStore::new();
        store.set("k", json!(1));
        assert!(store.get("k").is_none());
        assert!(!store.is_persistent());
    }
}
