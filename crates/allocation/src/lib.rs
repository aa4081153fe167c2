//! Allocation domain module.
//!
//! This crate contains the business rules for assigning order lines to stock
//! batches, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod batch;
pub mod engine;
pub mod order_line;

pub use batch::Batch;
pub use engine::{allocate, Allocation};
pub use order_line::OrderLine;
