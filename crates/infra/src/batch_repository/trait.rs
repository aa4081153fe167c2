use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockalloc_allocation::Batch;
use stockalloc_core::{BatchRef, OrderId, Sku};

/// Repository operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors. `DuplicateBatchRef` is the one business outcome a store
/// can detect on its own.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("batch {0} already exists")]
    DuplicateBatchRef(BatchRef),

    /// The stored state changed since it was loaded.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("unknown batch {0}")]
    UnknownBatch(BatchRef),

    #[error("storage error: {0}")]
    Storage(String),

    /// The backing store could not be reached (pool closed/timed out, IO).
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// One recorded allocation decision, as seen from an order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AllocationRecord {
    pub sku: Sku,
    pub batch_ref: BatchRef,
}

/// Persistence boundary for `Batch` aggregates.
///
/// ## Contract
///
/// - `add` registers a new batch; a reference can only be used once, across
///   all SKUs.
/// - `get_by_sku` returns every batch of the SKU with its full allocation
///   set (empty when the SKU has never been stocked).
/// - `save` persists a batch loaded through `get_by_sku`. It succeeds only if
///   the stored version still equals `batch.version()` and then bumps it by
///   one; otherwise it fails with `Concurrency` and changes nothing. An order
///   line can be stored against at most one batch.
/// - Once `save` returns `Ok`, later reads (including from a new process for
///   durable stores) observe the new allocation set.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn add(&self, batch: Batch) -> Result<(), RepositoryError>;

    async fn get_by_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError>;

    async fn save(&self, batch: &Batch) -> Result<(), RepositoryError>;

    /// Allocation decisions recorded for an order, sorted by SKU.
    async fn allocations_for(
        &self,
        orderid: &OrderId,
    ) -> Result<Vec<AllocationRecord>, RepositoryError>;
}

#[async_trait]
impl<S> BatchRepository for Arc<S>
where
    S: BatchRepository + ?Sized,
{
    async fn add(&self, batch: Batch) -> Result<(), RepositoryError> {
        (**self).add(batch).await
    }

    async fn get_by_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        (**self).get_by_sku(sku).await
    }

    async fn save(&self, batch: &Batch) -> Result<(), RepositoryError> {
        (**self).save(batch).await
    }

    async fn allocations_for(
        &self,
        orderid: &OrderId,
    ) -> Result<Vec<AllocationRecord>, RepositoryError> {
        (**self).allocations_for(orderid).await
    }
}
