use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockalloc_infra::AllocationRecord;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub orderid: String,
    pub sku: String,
    pub qty: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddBatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sku: String,
    pub qty: i64,
    /// ISO date; `null` or absent means the stock is already on hand.
    #[serde(default)]
    pub eta: Option<NaiveDate>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AllocateResponse {
    pub batchref: String,
}

#[derive(Debug, Serialize)]
pub struct AllocationView {
    pub sku: String,
    pub batchref: String,
}

impl From<AllocationRecord> for AllocationView {
    fn from(record: AllocationRecord) -> Self {
        Self {
            sku: record.sku.into_inner(),
            batchref: record.batch_ref.into_inner(),
        }
    }
}
