//! Per-package critical sections.
//!
//! Mutating workflows on one package name serialize; distinct names never
//! contend. Entries are dropped from the table once nobody holds or waits
//! on them, so the table does not grow with every name ever touched.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slot = Arc<Mutex<()>>;

/// Table of per-package mutexes.
#[derive(Clone, Default)]
pub struct PackageLocks {
    slots: Arc<DashMap<String, Slot>>,
}

impl PackageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `package`.
    pub async fn acquire(&self, package: &str) -> PackageGuard {
        let slot = self
            .slots
            .entry(package.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.clone().lock_owned().await;
        PackageGuard {
            guard: Some(guard),
            slot,
            package: package.to_string(),
            slots: self.slots.clone(),
        }
    }

    /// Number of names with a live entry.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Held for the duration of one workflow. Releases on drop.
pub struct PackageGuard {
    guard: Option<OwnedMutexGuard<()>>,
    slot: Slot,
    package: String,
    slots: Arc<DashMap<String, Slot>>,
}

impl Drop for PackageGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference and this guard another. Anything more
        // means a waiter already cloned the slot.
        self.slots.remove_if(&self.package, |_, slot| {
            Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2
        });
    }
}
