//! Allocation decision: pick one batch for an order line.
//!
//! Candidates are the batches of the line's SKU, scanned in priority order
//! (in-stock before in-transit, earliest ETA first, reference as tie-break).
//! The first one with enough available quantity receives the line. The
//! ordering is total, so the same inputs always yield the same batch.

use stockalloc_core::{BatchRef, DomainError, DomainResult};

use crate::batch::Batch;
use crate::order_line::OrderLine;

/// Outcome of a successful allocation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Reference of the chosen batch.
    pub batch_ref: BatchRef,
    /// `false` when an equal line was already allocated to that batch and
    /// nothing was mutated.
    pub is_new: bool,
}

/// Allocate `line` to one of `batches`, mutating only the chosen batch.
///
/// `batches` may contain other SKUs and need not be sorted. Fails with
/// `InvalidSku` when no batch of the line's SKU is present and with
/// `OutOfStock` when none has enough available quantity; in both cases no
/// batch is touched.
pub fn allocate(line: &OrderLine, batches: &mut [Batch]) -> DomainResult<Allocation> {
    let mut candidates: Vec<usize> = batches
        .iter()
        .enumerate()
        .filter(|(_, b)| b.sku() == line.sku())
        .map(|(idx, _)| idx)
        .collect();

    if candidates.is_empty() {
        return Err(DomainError::InvalidSku(line.sku().clone()));
    }

    // A line lives in at most one batch.
    if let Some(&idx) = candidates.iter().find(|&&idx| batches[idx].is_allocated(line)) {
        return Ok(Allocation {
            batch_ref: batches[idx].reference().clone(),
            is_new: false,
        });
    }

    candidates.sort_by(|&a, &b| batches[a].priority_key().cmp(&batches[b].priority_key()));

    let chosen = candidates
        .into_iter()
        .find(|&idx| batches[idx].can_allocate(line))
        .ok_or_else(|| DomainError::OutOfStock(line.sku().clone()))?;

    let batch = &mut batches[chosen];
    let is_new = batch.allocate(line.clone())?;

    Ok(Allocation {
        batch_ref: batch.reference().clone(),
        is_new,
    })
}
