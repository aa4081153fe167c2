use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn allocate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::AllocateRequest>,
) -> axum::response::Response {
    let batchref = match services
        .allocation
        .allocate_orderline(&body.orderid, &body.sku, body.qty)
        .await
    {
        Ok(r) => r,
        Err(e) => return errors::allocation_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(dto::AllocateResponse {
            batchref: batchref.into_inner(),
        }),
    )
        .into_response()
}

pub async fn allocations_for_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(orderid): Path<String>,
) -> axum::response::Response {
    let records = match services.allocation.allocations_for(&orderid).await {
        Ok(r) => r,
        Err(e) => return errors::allocation_error_to_response(e),
    };

    if records.is_empty() {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No allocations for order {orderid}."),
        );
    }

    let views: Vec<dto::AllocationView> = records.into_iter().map(Into::into).collect();
    (StatusCode::OK, Json(views)).into_response()
}
