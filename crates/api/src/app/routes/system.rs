use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde_json::{json, Value};

use crate::app::services::AppServices;

pub async fn hello() -> &'static str {
    "Hello, World!"
}

/// Liveness plus the configured store backend.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store": services.store.to_string(),
    }))
}
