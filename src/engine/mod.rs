pub mod assignment;
pub mod audit;
pub mod availability;
pub mod capacity;
pub mod compatibility;
pub mod lock;
pub mod orders;
pub mod sequence;
pub mod sweep;

use std::sync::Arc;

use tokio::sync::Mutex;

/// Serializes read-modify-write cycles on the order collections within one
/// process.
pub type WriteLock = Arc<Mutex<()>>;
