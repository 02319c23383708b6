//! Product reconciliation: edits that resize the in-stock pool, and restock
//! of backordered units.

use tracing::{info, instrument};
use warehouse_core::error::AppError;

use crate::models::{EditProduct, Money, UnitStatus};
use crate::services::database::{count_units, insert_fresh_units, product_exists, Database};
use crate::services::metrics::{DB_QUERY_DURATION, UNITS_ALLOCATED};

impl Database {
    /// Update a product's descriptive fields and reconcile its in-stock unit
    /// count to `input.quantity`.
    ///
    /// `quantity` is the desired number of in-stock units. Growing inserts
    /// fresh units; shrinking deletes the oldest in-stock units. Sold and
    /// invoiced units are never touched, so any reduction down to zero is
    /// achievable. Returns the number of product rows updated.
    #[instrument(skip(self, input), fields(name = %input.name, quantity = input.quantity))]
    pub async fn edit_product(&self, product_id: i64, input: &EditProduct) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["edit_product"])
            .start_timer();

        if input.name.trim().is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Product name cannot be empty"
            )));
        }
        if input.quantity < 0 {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Quantity cannot be negative"
            )));
        }
        if input.unit_price.is_sign_negative() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Unit price cannot be negative"
            )));
        }

        let now = self.now();
        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE products
            SET name = ?1, description = ?2, unit_price = ?3
            WHERE product_id = ?4
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(Money::from(input.unit_price))
        .bind(product_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Product {} not found",
                product_id
            )));
        }

        let in_stock = count_units(&mut *tx, product_id, UnitStatus::InStock).await?;
        let delta = input.quantity - in_stock;

        if delta > 0 {
            insert_fresh_units(&mut *tx, product_id, delta, now).await?;
        } else if delta < 0 {
            sqlx::query(
                r#"
                DELETE FROM stock_units
                WHERE unit_id IN (
                    SELECT unit_id FROM stock_units
                    WHERE product_id = ?1 AND status = 'in_stock'
                    ORDER BY unit_id ASC
                    LIMIT ?2
                )
                "#,
            )
            .bind(product_id)
            .bind(-delta)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to remove units: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            product_id = product_id,
            in_stock_before = in_stock,
            in_stock_after = input.quantity,
            "Product edited"
        );

        Ok(updated.rows_affected())
    }

    /// Clear a product's restocking flags and add one fresh in-stock unit per
    /// cleared flag. Returns the number of units restocked; calling it again
    /// with nothing pending returns 0.
    #[instrument(skip(self))]
    pub async fn mark_restocked(&self, product_id: i64) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_restocked"])
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

        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_units WHERE product_id = ?1 AND needs_restocking = 1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count pending restocks: {}", e))
        })?;

        if pending > 0 {
            sqlx::query(
                "UPDATE stock_units SET needs_restocking = 0 WHERE product_id = ?1 AND needs_restocking = 1",
            )
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to clear restock flags: {}", e))
            })?;

            insert_fresh_units(&mut *tx, product_id, pending, now).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        UNITS_ALLOCATED
            .with_label_values(&["restocked"])
            .inc_by(pending as f64);

        info!(product_id = product_id, restocked = pending, "Restock applied");

        Ok(pending as u64)
    }
}
