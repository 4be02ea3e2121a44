//! Cooperative lock over the shared store.
//!
//! This is not a correctness-grade mutex. It narrows the window in which two
//! writers sharing one store can interleave, and gives up after a timeout
//! rather than deadlocking: the caller then proceeds unlocked and relies on
//! its own verify-before-commit check.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::store::{SharedStore, StoreExt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub token: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Clone)]
pub struct StorageLock {
    store: Arc<dyn SharedStore>,
    key: &'static str,
    config: LockConfig,
}

/// Held lock; released on drop if the record still carries our token.
pub struct LockGuard {
    store: Arc<dyn SharedStore>,
    key: &'static str,
    token: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let current: Option<LockRecord> = self.store.get_or(self.key, None);
        if current.is_some_and(|record| record.token == self.token) {
            self.store.remove(self.key);
        } else {
            debug!(key = self.key, "lock was taken over before release");
        }
    }
}

impl StorageLock {
    pub fn new(store: Arc<dyn SharedStore>, key: &'static str, config: LockConfig) -> Self {
        Self { store, key, config }
    }

    /// Returns `None` when the lock could not be won before the timeout, or
    /// when the store keeps nothing to lock on.
    pub async fn acquire(&self) -> Option<LockGuard> {
        if !self.store.is_persistent() {
            return None;
        }

        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.config.give_up_after;

        loop {
            if self.try_claim(&token).await {
                return Some(LockGuard {
                    store: self.store.clone(),
                    key: self.key,
                    token,
                });
            }

            if Instant::now() >= deadline {
                warn!(key = self.key, "lock not acquired before timeout; proceeding without it");
                return None;
            }

            debug!(key = self.key, "lock busy; retrying");
            sleep(self.config.retry_every).await;
        }
    }

    async fn try_claim(&self, token: &str) -> bool {
        let now = Utc::now().timestamp_millis();
        let current: Option<LockRecord> = self.store.get_or(self.key, None);

        if current.is_some_and(|record| !self.is_stale(&record, now)) {
            return false;
        }

        self.store.put(
            self.key,
            &LockRecord {
                token: token.to_string(),
                timestamp: now,
            },
        );

        // let any competing writer land before checking who won
        tokio::task::yield_now().await;

        let confirmed: Option<LockRecord> = self.store.get_or(self.key, None);
        confirmed.is_some_and(|record| record.token == token)
    }

    fn is_stale(&self, record: &LockRecord, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(record.timestamp);
        age_ms > self.config.stale_after.as_millis() as i64
    }
}
