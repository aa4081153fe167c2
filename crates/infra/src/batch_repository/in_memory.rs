use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockalloc_allocation::Batch;
use stockalloc_core::{AggregateRoot, BatchRef, ExpectedVersion, OrderId, Sku};

use super::r#trait::{AllocationRecord, BatchRepository, RepositoryError};

#[derive(Debug, Default)]
struct Inner {
    by_sku: HashMap<Sku, Vec<Batch>>,
    /// Reference uniqueness is global, not per SKU.
    sku_of: HashMap<BatchRef, Sku>,
}

/// In-memory batch repository keyed by SKU.
///
/// Intended for tests/dev. State lives as long as the value does.
#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    inner: RwLock<Inner>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn add(&self, batch: Batch) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        if inner.sku_of.contains_key(batch.reference()) {
            return Err(RepositoryError::DuplicateBatchRef(batch.reference().clone()));
        }

        inner
            .sku_of
            .insert(batch.reference().clone(), batch.sku().clone());
        inner
            .by_sku
            .entry(batch.sku().clone())
            .or_default()
            .push(batch);
        Ok(())
    }

    async fn get_by_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.by_sku.get(sku).cloned().unwrap_or_default())
    }

    async fn save(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        let sku = inner
            .sku_of
            .get(batch.reference())
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownBatch(batch.reference().clone()))?;
        if &sku != batch.sku() {
            return Err(RepositoryError::Storage(format!(
                "batch {} is stored under sku {sku}, not {}",
                batch.reference(),
                batch.sku()
            )));
        }

        let siblings = inner.by_sku.entry(sku).or_default();

        for line in batch.allocations() {
            if let Some(other) = siblings
                .iter()
                .find(|b| b.reference() != batch.reference() && b.is_allocated(line))
            {
                return Err(RepositoryError::Concurrency(format!(
                    "order {} is already allocated to batch {}",
                    line.orderid(),
                    other.reference()
                )));
            }
        }

        let stored = siblings
            .iter_mut()
            .find(|b| b.reference() == batch.reference())
            .ok_or_else(|| RepositoryError::UnknownBatch(batch.reference().clone()))?;

        let expected = ExpectedVersion::of(batch);
        if !expected.matches(stored.version()) {
            return Err(RepositoryError::Concurrency(format!(
                "batch {}: expected {expected:?}, found version {}",
                batch.reference(),
                stored.version()
            )));
        }

        let mut updated = batch.clone();
        updated.mark_saved();
        *stored = updated;
        Ok(())
    }

    async fn allocations_for(
        &self,
        orderid: &OrderId,
    ) -> Result<Vec<AllocationRecord>, RepositoryError> {
        let inner = self.inner.read().map_err(poisoned)?;

        let mut records: Vec<AllocationRecord> = inner
            .by_sku
            .values()
            .flatten()
            .filter(|b| b.allocations().any(|l| l.orderid() == orderid))
            .map(|b| AllocationRecord {
                sku: b.sku().clone(),
                batch_ref: b.reference().clone(),
            })
            .collect();
        records.sort();
        Ok(records)
    }
}
