use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, LockConfig, StoreBackend};
use crate::engine::WriteLock;
use crate::engine::assignment::AssignmentService;
use crate::engine::audit::AuditLog;
use crate::engine::orders::OrderDesk;
use crate::engine::sequence::SequenceGenerator;
use crate::observability::metrics::Metrics;
use crate::store::{MemoryStore, NullStore, SharedStore};

pub struct AppState {
    pub store: Arc<dyn SharedStore>,
    pub sequence: SequenceGenerator,
    pub orders: OrderDesk,
    pub assignments: AssignmentService,
    pub audit: AuditLog,
    pub writes: WriteLock,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SharedStore>,
        lock_config: LockConfig,
        simulated_latency: Duration,
    ) -> Self {
        let metrics = Metrics::new();
        let writes = WriteLock::default();
        let audit = AuditLog::new(store.clone());
        let sequence = SequenceGenerator::new(store.clone(), lock_config, metrics.clone());

        Self {
            orders: OrderDesk::new(
                store.clone(),
                sequence.clone(),
                audit.clone(),
                metrics.clone(),
                writes.clone(),
            ),
            assignments: AssignmentService::new(
                store.clone(),
                audit.clone(),
                metrics.clone(),
                writes.clone(),
                simulated_latency,
            ),
            store,
            sequence,
            audit,
            writes,
            metrics,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn SharedStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new(config.event_buffer_size)),
            StoreBackend::None => Arc::new(NullStore::new()),
        };
        Self::new(store, config.lock, config.simulated_latency)
    }

    /// Fresh in-memory state with default timings.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new(1024)),
            LockConfig::default(),
            Duration::ZERO,
        )
    }
}
