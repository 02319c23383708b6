//! Allocation engine: FIFO selection and status transition of stock units.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use warehouse_core::error::AppError;

use crate::models::UnitStatus;
use crate::services::database::{count_units, product_exists, Database};
use crate::services::metrics::{DB_QUERY_DURATION, UNITS_ALLOCATED};

/// Select up to `requested` units of a product currently in `from` status and
/// transition them to `to`, stamping the matching date field (and the invoice
/// back-reference when invoicing).
///
/// Selection is oldest-first by `unit_id`, so repeated allocations from the
/// same state pick the same units. Returns the transitioned unit ids; a
/// shortage yields a shorter vector, never an error, and callers decide
/// remediation. Runs on the caller's transaction connection so the caller
/// owns atomicity.
pub(crate) async fn allocate_units(
    conn: &mut SqliteConnection,
    product_id: i64,
    requested: i64,
    from: UnitStatus,
    to: UnitStatus,
    now: DateTime<Utc>,
    invoice_id: Option<i64>,
) -> Result<Vec<i64>, AppError> {
    if requested <= 0 {
        return Ok(Vec::new());
    }

    let unit_ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT unit_id FROM stock_units
        WHERE product_id = ?1 AND status = ?2
        ORDER BY unit_id ASC
        LIMIT ?3
        "#,
    )
    .bind(product_id)
    .bind(from.as_str())
    .bind(requested)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to select units: {}", e)))?;

    for &unit_id in &unit_ids {
        let result = match to {
            UnitStatus::Sold => {
                sqlx::query("UPDATE stock_units SET status = ?1, sale_date = ?2 WHERE unit_id = ?3")
                    .bind(to.as_str())
                    .bind(now)
                    .bind(unit_id)
                    .execute(&mut *conn)
                    .await
            }
            UnitStatus::Invoiced => {
                sqlx::query(
                    "UPDATE stock_units SET status = ?1, invoice_date = ?2, invoice_id = ?3 WHERE unit_id = ?4",
                )
                .bind(to.as_str())
                .bind(now)
                .bind(invoice_id)
                .bind(unit_id)
                .execute(&mut *conn)
                .await
            }
            UnitStatus::InStock => {
                sqlx::query("UPDATE stock_units SET status = ?1 WHERE unit_id = ?2")
                    .bind(to.as_str())
                    .bind(unit_id)
                    .execute(&mut *conn)
                    .await
            }
        };
        result.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to transition unit: {}", e))
        })?;
    }

    Ok(unit_ids)
}

impl Database {
    /// Sell up to `quantity` units of a product (`in_stock` -> `sold`).
    ///
    /// Returns the number of units actually transitioned, which is less than
    /// `quantity` when stock runs short; shortage is a designed
    /// degraded-success outcome, not a failure.
    #[instrument(skip(self))]
    pub async fn sell_product(&self, product_id: i64, quantity: i64) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sell_product"])
            .start_timer();

        if quantity <= 0 {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Sale quantity must be positive"
            )));
        }

        let now = self.now();
        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if !product_exists(&mut *tx, product_id).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Product {} not found",
                product_id
            )));
        }

        let allocated = allocate_units(
            &mut *tx,
            product_id,
            quantity,
            UnitStatus::InStock,
            UnitStatus::Sold,
            now,
            None,
        )
        .await?;

        // Legacy informational columns on the product row.
        sqlx::query(
            r#"
            UPDATE products
            SET sale_date = ?1,
                status = CASE
                    WHEN NOT EXISTS (
                        SELECT 1 FROM stock_units
                        WHERE product_id = ?2 AND status = 'in_stock'
                    ) THEN 'sold'
                    ELSE status
                END
            WHERE product_id = ?2
            "#,
        )
        .bind(now)
        .bind(product_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to stamp product: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        UNITS_ALLOCATED
            .with_label_values(&["sold"])
            .inc_by(allocated.len() as f64);

        info!(
            product_id = product_id,
            requested = quantity,
            allocated = allocated.len(),
            "Units sold"
        );

        Ok(allocated.len() as u64)
    }

    /// Legacy single-product invoicing: transition all `sold` units of a
    /// product to `invoiced` without an invoice reference.
    #[instrument(skip(self))]
    pub async fn invoice_product(&self, product_id: i64) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_product"])
            .start_timer();

        let now = self.now();
        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if !product_exists(&mut *tx, product_id).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Product {} not found",
                product_id
            )));
        }

        let sold = count_units(&mut *tx, product_id, UnitStatus::Sold).await?;
        let allocated = allocate_units(
            &mut *tx,
            product_id,
            sold,
            UnitStatus::Sold,
            UnitStatus::Invoiced,
            now,
            None,
        )
        .await?;

        sqlx::query("UPDATE products SET invoice_date = ?1, status = 'invoiced' WHERE product_id = ?2")
            .bind(now)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to stamp product: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        UNITS_ALLOCATED
            .with_label_values(&["invoiced"])
            .inc_by(allocated.len() as f64);

        info!(
            product_id = product_id,
            invoiced = allocated.len(),
            "Sold units invoiced"
        );

        Ok(allocated.len() as u64)
    }
}
