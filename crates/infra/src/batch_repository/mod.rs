//! Batch repository boundary.
//!
//! This module defines the storage abstraction the allocation service is
//! written against, plus its implementations: in-memory (tests/dev), SQLite,
//! and Postgres behind the `postgres` feature.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod rows;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::InMemoryBatchRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBatchRepository;
pub use r#trait::{AllocationRecord, BatchRepository, RepositoryError};
pub use sqlite::SqliteBatchRepository;
