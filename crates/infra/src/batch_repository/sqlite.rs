//! SQLite-backed batch repository.
//!
//! Durable store for single-node deployments and for tests that need
//! allocations to survive a restart (open the same file again).
//!
//! All writes run inside one transaction; a transaction dropped before
//! `commit` (error or cancelled request) rolls back.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::instrument;

use stockalloc_allocation::Batch;
use stockalloc_core::{AggregateRoot, BatchRef, OrderId, Sku};

use super::rows::{assemble, is_unique_violation, map_sqlx_error, to_db_int, BatchRow, LineRow, SCHEMA};
use super::r#trait::{AllocationRecord, BatchRepository, RepositoryError};

#[derive(Debug, Clone)]
pub struct SqliteBatchRepository {
    pool: SqlitePool,
}

impl SqliteBatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and apply the schema.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://stockalloc.db`.
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| RepositoryError::Unavailable(format!("invalid sqlite url {url}: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn batch_row(row: &SqliteRow) -> Result<BatchRow, sqlx::Error> {
    Ok(BatchRow {
        reference: row.try_get("reference")?,
        sku: row.try_get("sku")?,
        purchased_quantity: row.try_get("purchased_quantity")?,
        eta: row.try_get("eta")?,
        version: row.try_get("version")?,
    })
}

fn line_row(row: &SqliteRow) -> Result<LineRow, sqlx::Error> {
    Ok(LineRow {
        batch_ref: row.try_get("batch_ref")?,
        orderid: row.try_get("orderid")?,
        sku: row.try_get("sku")?,
        qty: row.try_get("qty")?,
    })
}

/// The statements of `save`: bump the version, then insert the new lines.
///
/// Nothing is visible to other connections until the caller commits.
pub(crate) async fn write_save(
    conn: &mut SqliteConnection,
    batch: &Batch,
) -> Result<(), RepositoryError> {
    let updated = sqlx::query(
        r#"
        UPDATE batches
        SET version = version + 1
        WHERE reference = ?1 AND sku = ?2 AND version = ?3
        "#,
    )
    .bind(batch.reference().as_str())
    .bind(batch.sku().as_str())
    .bind(to_db_int(batch.version())?)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("bump_version", e))?;

    if updated.rows_affected() == 0 {
        let exists = sqlx::query("SELECT 1 FROM batches WHERE reference = ?1")
            .bind(batch.reference().as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("check_batch", e))?;
        return Err(match exists {
            Some(_) => RepositoryError::Concurrency(format!(
                "batch {} changed since version {}",
                batch.reference(),
                batch.version()
            )),
            None => RepositoryError::UnknownBatch(batch.reference().clone()),
        });
    }

    let stored = sqlx::query("SELECT batch_ref, orderid, sku, qty FROM allocations WHERE batch_ref = ?1")
        .bind(batch.reference().as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_allocations", e))?
        .iter()
        .map(line_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| map_sqlx_error("decode_allocation", e))?;

    for line in batch.allocations() {
        let qty = to_db_int(line.qty())?;
        let already_stored = stored.iter().any(|r| {
            r.orderid == line.orderid().as_str() && r.sku == line.sku().as_str() && r.qty == qty
        });
        if already_stored {
            continue;
        }

        sqlx::query("INSERT INTO allocations (batch_ref, orderid, sku, qty) VALUES (?1, ?2, ?3, ?4)")
            .bind(batch.reference().as_str())
            .bind(line.orderid().as_str())
            .bind(line.sku().as_str())
            .bind(qty)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_allocation", e))?;
    }

    Ok(())
}

#[async_trait]
impl BatchRepository for SqliteBatchRepository {
    #[instrument(skip(self, batch), fields(reference = %batch.reference(), sku = %batch.sku()), err)]
    async fn add(&self, batch: Batch) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO batches (reference, sku, purchased_quantity, eta, version)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(batch.reference().as_str())
        .bind(batch.sku().as_str())
        .bind(to_db_int(batch.purchased_quantity())?)
        .bind(batch.eta())
        .bind(to_db_int(batch.version())?)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::DuplicateBatchRef(batch.reference().clone())
            } else {
                map_sqlx_error("insert_batch", e)
            }
        })?;

        for line in batch.allocations() {
            sqlx::query("INSERT INTO allocations (batch_ref, orderid, sku, qty) VALUES (?1, ?2, ?3, ?4)")
                .bind(batch.reference().as_str())
                .bind(line.orderid().as_str())
                .bind(line.sku().as_str())
                .bind(to_db_int(line.qty())?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_allocation", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(sku = %sku), err)]
    async fn get_by_sku(&self, sku: &Sku) -> Result<Vec<Batch>, RepositoryError> {
        let batch_rows = sqlx::query(
            r#"
            SELECT reference, sku, purchased_quantity, eta, version
            FROM batches
            WHERE sku = ?1
            ORDER BY reference ASC
            "#,
        )
        .bind(sku.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_batches", e))?;

        let line_rows = sqlx::query(
            r#"
            SELECT a.batch_ref, a.orderid, a.sku, a.qty
            FROM allocations a
            JOIN batches b ON b.reference = a.batch_ref
            WHERE b.sku = ?1
            "#,
        )
        .bind(sku.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_allocations", e))?;

        let batches = batch_rows
            .iter()
            .map(batch_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_batch", e))?;
        let lines = line_rows
            .iter()
            .map(line_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_allocation", e))?;

        assemble(batches, lines)
    }

    #[instrument(skip(self, batch), fields(reference = %batch.reference(), version = batch.version()), err)]
    async fn save(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        write_save(&mut *tx, batch).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(orderid = %orderid), err)]
    async fn allocations_for(
        &self,
        orderid: &OrderId,
    ) -> Result<Vec<AllocationRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT sku, batch_ref
            FROM allocations
            WHERE orderid = ?1
            ORDER BY sku ASC, batch_ref ASC
            "#,
        )
        .bind(orderid.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_order_allocations", e))?;

        rows.iter()
            .map(|row| -> Result<AllocationRecord, RepositoryError> {
                let sku: String = row.try_get("sku").map_err(|e| map_sqlx_error("decode", e))?;
                let batch_ref: String = row
                    .try_get("batch_ref")
                    .map_err(|e| map_sqlx_error("decode", e))?;
                Ok(AllocationRecord {
                    sku: Sku::new(sku).map_err(|e| RepositoryError::Storage(e.to_string()))?,
                    batch_ref: BatchRef::new(batch_ref)
                        .map_err(|e| RepositoryError::Storage(e.to_string()))?,
                })
            })
            .collect()
    }
}
