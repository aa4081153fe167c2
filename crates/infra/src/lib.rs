//! Infrastructure layer: batch storage, allocation orchestration, config.

pub mod allocation_service;
pub mod batch_repository;
pub mod config;
pub mod sku_locks;

pub use allocation_service::{AllocationError, AllocationService, ServiceConfig};
pub use batch_repository::{
    AllocationRecord, BatchRepository, InMemoryBatchRepository, RepositoryError,
    SqliteBatchRepository,
};
#[cfg(feature = "postgres")]
pub use batch_repository::PostgresBatchRepository;
pub use config::{AppConfig, ConfigError, StoreBackend};
