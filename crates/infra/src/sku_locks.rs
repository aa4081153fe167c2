//! Per-SKU mutual exclusion for allocation units of work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockalloc_core::Sku;

/// Hands out one async mutex per SKU.
///
/// Different SKUs never contend. Idle entries are pruned whenever a lock is
/// requested, so the table only holds SKUs that are currently in use.
#[derive(Debug, Default)]
pub struct SkuLocks {
    locks: Mutex<HashMap<Sku, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one unit of work on a SKU.
pub type SkuGuard = OwnedMutexGuard<()>;

impl SkuLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `sku`. Callers bound this with a timeout.
    pub async fn lock(&self, sku: &Sku) -> SkuGuard {
        let lock = {
            // The map holds no invariants a panic could break.
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|key, l| key == sku || Arc::strong_count(l) > 1);
            locks.entry(sku.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of SKUs currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
