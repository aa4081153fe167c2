use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn add_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::AddBatchRequest>,
) -> axum::response::Response {
    if let Err(e) = services
        .allocation
        .add_batch(&body.reference, &body.sku, body.qty, body.eta)
        .await
    {
        return errors::allocation_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "ref": body.reference })),
    )
        .into_response()
}
