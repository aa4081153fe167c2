//! Row shapes and error mapping shared by the SQL-backed repositories.
//!
//! ## Error Mapping
//!
//! | SQLx Error | RepositoryError |
//! |------------|-----------------|
//! | Database (unique violation) | `Concurrency` (or `DuplicateBatchRef` on insert, decided by the caller) |
//! | PoolTimedOut / PoolClosed / Io | `Unavailable` |
//! | anything else | `Storage` |

use std::collections::HashMap;

use chrono::NaiveDate;

use stockalloc_allocation::{Batch, OrderLine};
use stockalloc_core::{BatchRef, OrderId, Sku};

use super::r#trait::RepositoryError;

/// Schema, in creation order. Both SQLite and Postgres accept these statements.
pub(crate) const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS batches (
        reference          TEXT PRIMARY KEY,
        sku                TEXT NOT NULL,
        purchased_quantity BIGINT NOT NULL CHECK (purchased_quantity >= 0),
        eta                DATE NULL,
        version            BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS batches_sku_idx ON batches (sku)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS allocations (
        batch_ref TEXT NOT NULL REFERENCES batches (reference),
        orderid   TEXT NOT NULL,
        sku       TEXT NOT NULL,
        qty       BIGINT NOT NULL CHECK (qty > 0),
        UNIQUE (orderid, sku, qty)
    )
    "#,
];

#[derive(Debug)]
pub(crate) struct BatchRow {
    pub reference: String,
    pub sku: String,
    pub purchased_quantity: i64,
    pub eta: Option<NaiveDate>,
    pub version: i64,
}

#[derive(Debug)]
pub(crate) struct LineRow {
    pub batch_ref: String,
    pub orderid: String,
    pub sku: String,
    pub qty: i64,
}

fn corrupt(msg: impl core::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("corrupt stored data: {msg}"))
}

pub(crate) fn to_db_int(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| RepositoryError::Storage(format!("{value} exceeds BIGINT")))
}

fn from_db_int(value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| corrupt(format!("negative quantity/version {value}")))
}

/// Rebuild aggregates from their rows. Lines whose batch is not in
/// `batches` are ignored.
pub(crate) fn assemble(
    batches: Vec<BatchRow>,
    lines: Vec<LineRow>,
) -> Result<Vec<Batch>, RepositoryError> {
    let mut lines_by_batch: HashMap<String, Vec<OrderLine>> = HashMap::new();
    for row in lines {
        let line = OrderLine::new(
            OrderId::new(row.orderid).map_err(corrupt)?,
            Sku::new(row.sku).map_err(corrupt)?,
            row.qty,
        )
        .map_err(corrupt)?;
        lines_by_batch.entry(row.batch_ref).or_default().push(line);
    }

    batches
        .into_iter()
        .map(|row| {
            let lines = lines_by_batch.remove(&row.reference).unwrap_or_default();
            Batch::restore(
                BatchRef::new(row.reference).map_err(corrupt)?,
                Sku::new(row.sku).map_err(corrupt)?,
                from_db_int(row.purchased_quantity)?,
                row.eta,
                lines,
                from_db_int(row.version)?,
            )
            .map_err(corrupt)
        })
        .collect()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            if db_err.is_unique_violation() {
                RepositoryError::Concurrency(msg)
            } else {
                RepositoryError::Storage(msg)
            }
        }
        sqlx::Error::PoolTimedOut => {
            RepositoryError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => RepositoryError::Unavailable(format!("io error in {operation}: {e}")),
        other => RepositoryError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockalloc_core::AggregateRoot;

    fn batch_row(reference: &str, qty: i64) -> BatchRow {
        BatchRow {
            reference: reference.to_string(),
            sku: "LAMP".to_string(),
            purchased_quantity: qty,
            eta: None,
            version: 2,
        }
    }

    fn line_row(batch_ref: &str, orderid: &str, qty: i64) -> LineRow {
        LineRow {
            batch_ref: batch_ref.to_string(),
            orderid: orderid.to_string(),
            sku: "LAMP".to_string(),
            qty,
        }
    }

    #[test]
    fn assemble_groups_lines_by_batch() {
        let batches = assemble(
            vec![batch_row("b1", 10), batch_row("b2", 10)],
            vec![line_row("b1", "o1", 3), line_row("b2", "o2", 4), line_row("b1", "o3", 1)],
        )
        .unwrap();

        assert_eq!(batches[0].allocated_quantity(), 4);
        assert_eq!(batches[1].allocated_quantity(), 4);
        assert_eq!(batches[0].version(), 2);
    }

    #[test]
    fn over_allocated_rows_are_reported_as_storage_errors() {
        let err = assemble(vec![batch_row("b1", 1)], vec![line_row("b1", "o1", 3)]).unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(_)));
    }

    #[test]
    fn negative_quantities_are_corrupt() {
        let err = assemble(vec![batch_row("b1", -1)], vec![]).unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(_)));
    }
}
