use std::collections::BTreeSet;

use chrono::NaiveDate;

use stockalloc_core::{AggregateRoot, BatchRef, DomainError, DomainResult, Sku};

use crate::order_line::OrderLine;

/// Aggregate root: a lot of stock for one SKU.
///
/// `eta == None` means the stock is already in the warehouse. The batch owns
/// its allocation set; the only mutation is [`Batch::allocate`].
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    purchased_quantity: u64,
    eta: Option<NaiveDate>,
    allocations: BTreeSet<OrderLine>,
    version: u64,
}

impl Batch {
    /// A freshly registered batch with nothing allocated.
    pub fn new(
        reference: BatchRef,
        sku: Sku,
        purchased_quantity: u64,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference,
            sku,
            purchased_quantity,
            eta,
            allocations: BTreeSet::new(),
            version: 0,
        }
    }

    /// Rehydrate a batch from storage.
    pub fn restore(
        reference: BatchRef,
        sku: Sku,
        purchased_quantity: u64,
        eta: Option<NaiveDate>,
        allocations: impl IntoIterator<Item = OrderLine>,
        version: u64,
    ) -> DomainResult<Self> {
        let mut batch = Self::new(reference, sku, purchased_quantity, eta);
        batch.version = version;

        for line in allocations {
            if line.sku() != &batch.sku {
                return Err(DomainError::invariant(format!(
                    "batch {} holds a line for sku {}",
                    batch.reference,
                    line.sku()
                )));
            }
            batch.allocations.insert(line);
        }

        let allocated = batch
            .allocations
            .iter()
            .try_fold(0u64, |sum, line| sum.checked_add(line.qty()));
        match allocated {
            Some(allocated) if allocated <= batch.purchased_quantity => {}
            Some(allocated) => {
                return Err(DomainError::invariant(format!(
                    "batch {} is over-allocated ({allocated} > {})",
                    batch.reference, batch.purchased_quantity
                )));
            }
            None => {
                return Err(DomainError::invariant(format!(
                    "batch {} allocated quantity overflows",
                    batch.reference
                )));
            }
        }

        Ok(batch)
    }

    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn purchased_quantity(&self) -> u64 {
        self.purchased_quantity
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn allocated_quantity(&self) -> u64 {
        self.allocations.iter().map(OrderLine::qty).sum()
    }

    pub fn available_quantity(&self) -> u64 {
        // `restore` and `allocate` keep allocated <= purchased.
        self.purchased_quantity - self.allocated_quantity()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        line.sku() == &self.sku && self.available_quantity() >= line.qty()
    }

    /// Selection priority: in-stock first, then earliest ETA, then reference.
    pub fn priority_key(&self) -> (bool, Option<NaiveDate>, &BatchRef) {
        (self.eta.is_some(), self.eta, &self.reference)
    }

    /// Add `line` to this batch.
    ///
    /// Returns `false` when an equal line is already allocated here.
    pub fn allocate(&mut self, line: OrderLine) -> DomainResult<bool> {
        if self.is_allocated(&line) {
            return Ok(false);
        }
        if line.sku() != &self.sku {
            return Err(DomainError::invariant(format!(
                "cannot allocate sku {} to batch {} of sku {}",
                line.sku(),
                self.reference,
                self.sku
            )));
        }
        if !self.can_allocate(&line) {
            return Err(DomainError::OutOfStock(self.sku.clone()));
        }
        self.allocations.insert(line);
        Ok(true)
    }

    /// Advance the version after the state was persisted. Stores call this.
    pub fn mark_saved(&mut self) {
        self.version += 1;
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl AggregateRoot for Batch {
    type Id = BatchRef;

    fn id(&self) -> &Self::Id {
        &self.reference
    }

    fn version(&self) -> u64 {
        self.version
    }
}
