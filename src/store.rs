//! Latest-snapshot storage for pull-based consumers.

use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Result, TelemetryError};
use crate::structdef::{Snapshot, Value};

#[derive(Default)]
struct Slot {
    current: ArcSwapOption<Snapshot>,
    publishes: AtomicU64,
}

/// Holds the most recently published snapshot.
///
/// Clones share the same slot, so a handle can be given to readers on other
/// threads while the poll loop keeps publishing. Each publish replaces the
/// whole snapshot atomically.
#[derive(Clone, Default)]
pub struct ValueStore {
    slot: Arc<Slot>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: Snapshot) {
        self.slot.current.store(Some(Arc::new(snapshot)));
        self.slot.publishes.fetch_add(1, Ordering::Relaxed);
    }

    /// The current snapshot, or `None` before the first publish.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.slot.current.load_full()
    }

    /// Look up one field of the current snapshot.
    pub fn value(&self, name: &str) -> Result<Value> {
        let guard = self.slot.current.load();
        let snapshot = (*guard).as_deref().ok_or(TelemetryError::NotInitialized)?;
        snapshot
            .get(name)
            .cloned()
            .ok_or_else(|| TelemetryError::FieldNotFound(name.to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.current.load().is_some()
    }

    /// Number of snapshots published so far.
    pub fn publish_count(&self) -> u64 {
        self.slot.publishes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("initialized", &self.is_initialized())
            .field("publishes", &self.publish_count())
            .finish()
    }
}
