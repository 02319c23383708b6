//! Invoice issuance.
//!
//! An invoice is created atomically with its stock effects: every line
//! consumes in-stock units of its product FIFO, and any shortfall is covered
//! by synthesizing backorder units that are born `invoiced` and flagged for
//! restocking. Either the header, all lines and all unit transitions commit
//! together, or nothing does.

use tracing::{info, instrument, warn};
use warehouse_core::error::AppError;

use crate::models::{InvoiceDetails, InvoiceLineDetail, InvoiceStatus, Money, NewInvoice, UnitStatus};
use crate::services::allocation::allocate_units;
use crate::services::database::{product_exists, Database};
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_TOTAL, UNITS_ALLOCATED};

impl Database {
    /// Issue an invoice: insert the header, allocate units per line, and
    /// record the lines. Returns the new invoice id.
    #[instrument(skip(self, input), fields(customer = %input.customer_name, lines = input.lines.len()))]
    pub async fn create_invoice(&self, input: &NewInvoice) -> Result<i64, AppError> {
        let result = self.create_invoice_inner(input).await;
        match &result {
            Ok(invoice_id) => {
                INVOICES_TOTAL.with_label_values(&["ok"]).inc();
                info!(invoice_id = invoice_id, "Invoice issued");
            }
            Err(e) => {
                INVOICES_TOTAL.with_label_values(&["error"]).inc();
                warn!(error = %e, "Invoice issuance failed");
            }
        }
        result
    }

    async fn create_invoice_inner(&self, input: &NewInvoice) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        if input.customer_name.trim().is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Customer name cannot be empty"
            )));
        }
        if input.lines.is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Invoice must have at least one line"
            )));
        }
        for line in &input.lines {
            if line.quantity <= 0 {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Line quantity must be positive for product {}",
                    line.product_id
                )));
            }
            if line.unit_price.is_sign_negative() {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Line unit price cannot be negative for product {}",
                    line.product_id
                )));
            }
        }

        let now = self.now();
        let invoice_number = self.invoice_numbers.next(now);

        // Total is fixed at issuance; decimal arithmetic keeps it exact.
        let total: Money = input
            .lines
            .iter()
            .fold(Money::ZERO, |acc, line| {
                acc + Money::from(line.unit_price) * line.quantity
            });

        let mut tx = self.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let header = sqlx::query(
            r#"
            INSERT INTO invoices (invoice_number, customer_name, issue_date, due_date, total_amount, status, created_utc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&invoice_number)
        .bind(&input.customer_name)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(total)
        .bind(InvoiceStatus::Draft.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                anyhow::anyhow!("Invoice number {} already exists", invoice_number),
            ),
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice: {}", e)),
        })?;

        let invoice_id = header.last_insert_rowid();
        let mut allocated_total = 0usize;
        let mut backordered_total = 0i64;

        for line in &input.lines {
            if !product_exists(&mut *tx, line.product_id).await? {
                // Dropping the transaction rolls everything back.
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Product {} not found",
                    line.product_id
                )));
            }

            let allocated = allocate_units(
                &mut *tx,
                line.product_id,
                line.quantity,
                UnitStatus::InStock,
                UnitStatus::Invoiced,
                now,
                Some(invoice_id),
            )
            .await?;
            allocated_total += allocated.len();

            // Shortfall becomes backorder units: born invoiced, flagged for
            // restocking, counted in the line like any other unit.
            let shortfall = line.quantity - allocated.len() as i64;
            for _ in 0..shortfall {
                sqlx::query(
                    r#"
                    INSERT INTO stock_units (product_id, status, invoice_date, invoice_id, needs_restocking, created_utc)
                    VALUES (?1, ?2, ?3, ?4, 1, ?5)
                    "#,
                )
                .bind(line.product_id)
                .bind(UnitStatus::Invoiced.as_str())
                .bind(now)
                .bind(invoice_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to insert backorder unit: {}", e))
                })?;
            }
            backordered_total += shortfall;

            let line_total = Money::from(line.unit_price) * line.quantity;
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (invoice_id, product_id, quantity, unit_price, total_price)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(invoice_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(Money::from(line.unit_price))
            .bind(line_total)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice line: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        UNITS_ALLOCATED
            .with_label_values(&["invoiced"])
            .inc_by(allocated_total as f64);

        info!(
            invoice_id = invoice_id,
            invoice_number = %invoice_number,
            allocated = allocated_total,
            backordered = backordered_total,
            "Invoice stock effects applied"
        );

        Ok(invoice_id)
    }

    /// Get an invoice with its lines joined to product names.
    #[instrument(skip(self))]
    pub async fn get_invoice_details(&self, invoice_id: i64) -> Result<InvoiceDetails, AppError> {
        let invoice = self.get_invoice(invoice_id).await?;

        let lines = sqlx::query_as::<_, InvoiceLineDetail>(
            r#"
            SELECT l.line_id, l.invoice_id, l.product_id, p.name AS product_name,
                   l.quantity, l.unit_price, l.total_price
            FROM invoice_lines l
            JOIN products p ON p.product_id = l.product_id
            WHERE l.invoice_id = ?1
            ORDER BY l.line_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list invoice lines: {}", e))
        })?;

        Ok(InvoiceDetails { invoice, lines })
    }
}
