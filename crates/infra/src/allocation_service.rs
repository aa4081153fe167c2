//! Allocation use cases (application-level orchestration).
//!
//! ```text
//! allocate_orderline(orderid, sku, qty)
//!   ↓
//! 1. Build + validate the OrderLine
//!   ↓
//! 2. Lock the SKU (bounded wait)
//!   ↓
//! 3. Load the SKU's batches from the repository
//!   ↓
//! 4. Decide (pure engine, mutates private copies only)
//!   ↓
//! 5. Save the chosen batch (optimistic version check)
//! ```
//!
//! Steps 3-5 are retried on `Concurrency` up to `max_attempts` times. Every
//! repository call and the lock wait are bounded by `timeout`. Domain errors
//! are returned as-is and never retried.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockalloc_allocation::{allocate, Batch, OrderLine};
use stockalloc_core::{BatchRef, DomainError, OrderId, Sku};

use crate::batch_repository::{AllocationRecord, BatchRepository, RepositoryError};
use crate::sku_locks::SkuLocks;

/// Tuning knobs for the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Attempts of the read-decide-write cycle before giving up on conflicts.
    pub max_attempts: u32,
    /// Upper bound for each repository call and for waiting on a SKU lock.
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Error)]
pub enum AllocationError {
    /// Business rule failure; safe to show to the caller verbatim.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Concurrent writers kept winning; the request may be retried later.
    #[error("allocation still conflicting after {attempts} attempt(s)")]
    Conflict { attempts: u32 },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl AllocationError {
    pub fn is_domain(&self) -> bool {
        matches!(self, AllocationError::Domain(_))
    }
}

impl From<RepositoryError> for AllocationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::DuplicateBatchRef(r) => DomainError::DuplicateBatchRef(r).into(),
            RepositoryError::Concurrency(_) => AllocationError::Conflict { attempts: 1 },
            other => AllocationError::Unavailable(other.to_string()),
        }
    }
}

/// Entry point for the allocation use cases.
///
/// Generic over the repository so tests can plug in the in-memory store and
/// the API can plug in whichever backend is configured.
#[derive(Debug)]
pub struct AllocationService<R> {
    repo: R,
    locks: SkuLocks,
    config: ServiceConfig,
}

impl<R> AllocationService<R> {
    pub fn new(repo: R, config: ServiceConfig) -> Self {
        Self {
            repo,
            locks: SkuLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> ServiceConfig {
        self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}

impl<R> AllocationService<R>
where
    R: BatchRepository,
{
    /// Register a new batch with nothing allocated.
    #[instrument(skip(self), err(level = "info"))]
    pub async fn add_batch(
        &self,
        reference: &str,
        sku: &str,
        qty: i64,
        eta: Option<NaiveDate>,
    ) -> Result<(), AllocationError> {
        let reference = BatchRef::new(reference)?;
        let sku = Sku::new(sku)?;
        let purchased_quantity =
            u64::try_from(qty).map_err(|_| DomainError::InvalidQuantity(qty))?;

        let batch = Batch::new(reference, sku, purchased_quantity, eta);

        let _guard = self.bounded("sku_lock", async { Ok(self.locks.lock(batch.sku()).await) }).await?;
        self.bounded("add", self.repo.add(batch)).await?;
        Ok(())
    }

    /// Allocate one order line and return the reference of the chosen batch.
    #[instrument(skip(self), err(level = "info"))]
    pub async fn allocate_orderline(
        &self,
        orderid: &str,
        sku: &str,
        qty: i64,
    ) -> Result<BatchRef, AllocationError> {
        let line = OrderLine::new(OrderId::new(orderid)?, Sku::new(sku)?, qty)?;

        let _guard = self
            .bounded("sku_lock", async { Ok(self.locks.lock(line.sku()).await) })
            .await?;

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.allocate_once(&line).await {
                Err(AllocationError::Conflict { .. }) => {
                    warn!(attempt, max_attempts, sku = %line.sku(), "allocation conflicted; retrying");
                }
                other => return other,
            }
        }

        tracing::error!(sku = %line.sku(), orderid = %line.orderid(), "allocation retries exhausted");
        Err(AllocationError::Conflict {
            attempts: max_attempts,
        })
    }

    /// Allocation decisions recorded for `orderid`.
    pub async fn allocations_for(
        &self,
        orderid: &str,
    ) -> Result<Vec<AllocationRecord>, AllocationError> {
        let orderid = OrderId::new(orderid)?;
        self.bounded("allocations_for", self.repo.allocations_for(&orderid))
            .await
    }

    async fn allocate_once(&self, line: &OrderLine) -> Result<BatchRef, AllocationError> {
        let mut batches = self
            .bounded("get_by_sku", self.repo.get_by_sku(line.sku()))
            .await?;
        if batches.is_empty() {
            return Err(DomainError::InvalidSku(line.sku().clone()).into());
        }

        let outcome = allocate(line, &mut batches)?;

        if outcome.is_new {
            let chosen = batches
                .iter()
                .find(|b| b.reference() == &outcome.batch_ref)
                .ok_or_else(|| DomainError::invariant("chosen batch vanished"))?;
            self.bounded("save", self.repo.save(chosen)).await?;
        }

        info!(
            sku = %line.sku(),
            orderid = %line.orderid(),
            batchref = %outcome.batch_ref,
            new = outcome.is_new,
            "order line allocated"
        );
        Ok(outcome.batch_ref)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, AllocationError> {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result.map_err(AllocationError::from),
            Err(_) => {
                tracing::error!(operation, timeout = ?self.config.timeout, "operation timed out");
                Err(AllocationError::Timeout {
                    operation,
                    after: self.config.timeout,
                })
            }
        }
    }
}
