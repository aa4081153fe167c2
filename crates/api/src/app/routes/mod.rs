use axum::{
    routing::{get, post},
    Router,
};

pub mod allocation;
pub mod batches;
pub mod system;

/// Router for every endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/", get(system::hello))
        .route("/health", get(system::health))
        .route("/allocate", post(allocation::allocate))
        .route("/allocations/:orderid", get(allocation::allocations_for_order))
        .route("/add_batch", post(batches::add_batch))
}
