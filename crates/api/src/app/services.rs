use std::sync::Arc;

use thiserror::Error;

use stockalloc_infra::{
    AllocationService, AppConfig, BatchRepository, InMemoryBatchRepository, RepositoryError,
    ServiceConfig, SqliteBatchRepository, StoreBackend,
};

/// Repository handle shared by every request.
pub type SharedRepository = Arc<dyn BatchRepository>;

/// Everything the handlers need, shared behind an `Arc` extension.
pub struct AppServices {
    pub allocation: AllocationService<SharedRepository>,
    pub store: StoreBackend,
}

impl AppServices {
    pub fn new(repo: SharedRepository, config: ServiceConfig, store: StoreBackend) -> Self {
        Self {
            allocation: AllocationService::new(repo, config),
            store,
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory(config: ServiceConfig) -> Self {
        Self::new(
            Arc::new(InMemoryBatchRepository::new()),
            config,
            StoreBackend::Memory,
        )
    }
}

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to open {store} store: {source}")]
    Store {
        store: StoreBackend,
        #[source]
        source: RepositoryError,
    },

    #[error("STORE_BACKEND=postgres needs a build with the `postgres` feature")]
    PostgresDisabled,
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServicesError> {
    let repo: SharedRepository = match config.store {
        StoreBackend::Memory => Arc::new(InMemoryBatchRepository::new()),
        StoreBackend::Sqlite => Arc::new(
            SqliteBatchRepository::connect(&config.database_url)
                .await
                .map_err(|source| ServicesError::Store {
                    store: StoreBackend::Sqlite,
                    source,
                })?,
        ),
        StoreBackend::Postgres => postgres_repository(&config.database_url).await?,
    };

    tracing::info!(store = %config.store, "batch repository ready");
    Ok(AppServices::new(repo, config.service, config.store))
}

#[cfg(feature = "postgres")]
async fn postgres_repository(url: &str) -> Result<SharedRepository, ServicesError> {
    let repo = stockalloc_infra::PostgresBatchRepository::connect(url)
        .await
        .map_err(|source| ServicesError::Store {
            store: StoreBackend::Postgres,
            source,
        })?;
    Ok(Arc::new(repo))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_repository(_url: &str) -> Result<SharedRepository, ServicesError> {
    Err(ServicesError::PostgresDisabled)
}
