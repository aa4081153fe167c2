use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockalloc_core::DomainError;
use stockalloc_infra::AllocationError;

/// Domain failures are the caller's problem (400) and carry the domain message
/// verbatim. Infrastructure failures are reported as 503/504.
pub fn allocation_error_to_response(err: AllocationError) -> axum::response::Response {
    match err {
        AllocationError::Domain(e) => {
            let code = domain_error_code(&e);
            json_error(StatusCode::BAD_REQUEST, code, e.to_string())
        }
        AllocationError::Conflict { .. } => {
            tracing::warn!(error = %err, "allocation gave up on conflicts");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "conflict", err.to_string())
        }
        AllocationError::Timeout { .. } => {
            json_error(StatusCode::GATEWAY_TIMEOUT, "timeout", err.to_string())
        }
        AllocationError::Unavailable(_) => {
            tracing::error!(error = %err, "repository unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", err.to_string())
        }
    }
}

fn domain_error_code(err: &DomainError) -> &'static str {
    match err {
        DomainError::InvalidSku(_) => "invalid_sku",
        DomainError::OutOfStock(_) => "out_of_stock",
        DomainError::InvalidQuantity(_) => "invalid_quantity",
        DomainError::DuplicateBatchRef(_) => "duplicate_batch_ref",
        DomainError::Validation(_) => "validation_error",
        DomainError::InvariantViolation(_) => "invariant_violation",
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
