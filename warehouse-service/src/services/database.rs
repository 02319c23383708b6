//! SQLite-backed ledger store.
//!
//! `Database` is the single source of truth for products, stock units,
//! invoices and invoice lines. Every multi-step operation (here and in the
//! allocation/invoicing/reconcile modules) runs inside one transaction:
//! either all of its statements commit or none do.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use warehouse_core::config::DatabaseConfig;
use warehouse_core::error::AppError;

use crate::clock::{Clock, InvoiceNumberGenerator, SystemClock};
use crate::models::{
    Invoice, InvoiceLine, Money, NewProduct, Product, ProductSummary, StockFilter, StockUnit,
    UnitStatus,
};
use crate::services::metrics::{DB_QUERY_DURATION, PRODUCTS_CREATED};

const PRODUCT_SUMMARY_SELECT: &str = r#"
    SELECT p.product_id, p.name, p.description, p.unit_price, p.status,
           COUNT(u.unit_id) AS total_items,
           COALESCE(SUM(CASE WHEN u.status = 'in_stock' THEN 1 ELSE 0 END), 0) AS items_in_stock,
           COALESCE(SUM(CASE WHEN u.status = 'sold' THEN 1 ELSE 0 END), 0) AS items_sold,
           COALESCE(SUM(CASE WHEN u.status = 'invoiced' THEN 1 ELSE 0 END), 0) AS items_invoiced,
           COALESCE(SUM(CASE WHEN u.needs_restocking = 1 THEN 1 ELSE 0 END), 0) AS items_to_restock,
           MAX(u.sale_date) AS last_sale_date,
           MAX(u.invoice_date) AS last_invoice_date
    FROM products p
    LEFT JOIN stock_units u ON u.product_id = p.product_id
    GROUP BY p.product_id
"#;

/// Database connection pool wrapper with an injected clock.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    pub(crate) invoice_numbers: Arc<InvoiceNumberGenerator>,
}

impl Database {
    /// Open (or create) the database file and build a connection pool.
    #[instrument(skip(url))]
    pub async fn new(url: &str, max_connections: u32, min_connections: u32) -> Result<Self, AppError> {
        Self::with_clock(url, max_connections, min_connections, Arc::new(SystemClock)).await
    }

    /// As [`Database::new`], with an explicit time source.
    pub async fn with_clock(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to SQLite"
        );

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid database url: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("SQLite connection pool established");

        Ok(Self {
            pool,
            clock,
            invoice_numbers: Arc::new(InvoiceNumberGenerator::new()),
        })
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, AppError> {
        Self::new(&config.url, config.max_connections, config.min_connections).await
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Create the schema. This is the only initialization entry point; the
    /// store never creates tables implicitly.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a product and its initial batch of in-stock units.
    #[instrument(skip(self, input), fields(name = %input.name, quantity = input.quantity))]
    pub async fn add_product(&self, input: &NewProduct) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_product"])
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
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (name, description, unit_price, status, created_utc)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(Money::from(input.unit_price))
        .bind(UnitStatus::InStock.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert product: {}", e)))?;

        let product_id = result.last_insert_rowid();

        insert_fresh_units(&mut *tx, product_id, input.quantity, now).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        PRODUCTS_CREATED.inc();

        info!(product_id = product_id, units = input.quantity, "Product created");

        Ok(product_id)
    }

    /// Get a product by ID.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i64) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, description, unit_price, status, sale_date, invoice_date, created_utc
            FROM products
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        product.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Product {} not found", product_id))
        })
    }

    /// List products with their unit-derived counts.
    ///
    /// The counts (`total_items`, `items_in_stock`, ...) are a read-time
    /// projection over `stock_units`; no stored counter exists to drift.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: StockFilter) -> Result<Vec<ProductSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let having = match filter {
            StockFilter::All => "",
            StockFilter::InStock => "HAVING items_in_stock > 0",
            StockFilter::Invoiced => "HAVING items_invoiced > 0",
            StockFilter::ToRestock => "HAVING items_to_restock > 0",
        };
        let sql = format!("{PRODUCT_SUMMARY_SELECT} {having} ORDER BY p.product_id");

        let products = sqlx::query_as::<_, ProductSummary>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e))
            })?;

        timer.observe_duration();

        Ok(products)
    }

    /// List a product's units in creation order.
    #[instrument(skip(self))]
    pub async fn list_units(&self, product_id: i64) -> Result<Vec<StockUnit>, AppError> {
        let units = sqlx::query_as::<_, StockUnit>(
            r#"
            SELECT unit_id, product_id, status, sale_date, invoice_date, invoice_id, needs_restocking, created_utc
            FROM stock_units
            WHERE product_id = ?1
            ORDER BY unit_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list units: {}", e)))?;

        Ok(units)
    }

    // -------------------------------------------------------------------------
    // Invoice Lookups
    // -------------------------------------------------------------------------

    /// Get an invoice header by ID.
    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: i64) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, customer_name, issue_date, due_date, total_amount, status, created_utc
            FROM invoices
            WHERE invoice_id = ?1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        invoice.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
        })
    }

    /// List all invoice headers, oldest first.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, customer_name, issue_date, due_date, total_amount, status, created_utc
            FROM invoices
            ORDER BY invoice_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        Ok(invoices)
    }

    /// List an invoice's lines in insertion order.
    #[instrument(skip(self))]
    pub async fn list_invoice_lines(&self, invoice_id: i64) -> Result<Vec<InvoiceLine>, AppError> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT line_id, invoice_id, product_id, quantity, unit_price, total_price
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY line_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list lines: {}", e)))?;

        Ok(lines)
    }

    // -------------------------------------------------------------------------
    // Reset Utility
    // -------------------------------------------------------------------------

    /// Delete all data from all tables. Explicit testing/reset entry point;
    /// never triggered implicitly.
    #[instrument(skip(self))]
    pub async fn clear_all_data(&self) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Child tables first so foreign keys hold mid-transaction.
        for table in ["invoice_lines", "stock_units", "invoices", "products"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear {}: {}", table, e))
                })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        info!("All data cleared");

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Transaction-level helpers shared by the allocation/invoicing/reconcile paths
// -----------------------------------------------------------------------------

/// Check that a product row exists, on the caller's transaction connection.
pub(crate) async fn product_exists(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> Result<bool, AppError> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT product_id FROM products WHERE product_id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to check product: {}", e))
            })?;
    Ok(found.is_some())
}

/// Count a product's units in the given status.
pub(crate) async fn count_units(
    conn: &mut SqliteConnection,
    product_id: i64,
    status: UnitStatus,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM stock_units WHERE product_id = ?1 AND status = ?2",
    )
    .bind(product_id)
    .bind(status.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count units: {}", e)))?;
    Ok(count)
}

/// Insert `count` fresh in-stock units for a product.
pub(crate) async fn insert_fresh_units(
    conn: &mut SqliteConnection,
    product_id: i64,
    count: i64,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    for _ in 0..count {
        sqlx::query(
            r#"
            INSERT INTO stock_units (product_id, status, needs_restocking, created_utc)
            VALUES (?1, ?2, 0, ?3)
            "#,
        )
        .bind(product_id)
        .bind(UnitStatus::InStock.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert unit: {}", e)))?;
    }
    Ok(())
}
