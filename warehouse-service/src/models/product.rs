//! Product models: the aggregate row and its unit-derived projection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::money::Money;

/// Product row. `status`, `sale_date` and `invoice_date` are legacy
/// informational columns stamped by the single-product sell/invoice paths;
/// the engine never reads them back. There is no stored quantity: the
/// aggregate count is always derived from `stock_units` at read time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub status: String,
    pub sale_date: Option<DateTime<Utc>>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

/// Read-time projection over a product's units. Computed by aggregation on
/// every query, never cached.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub status: String,
    pub total_items: i64,
    pub items_in_stock: i64,
    pub items_sold: i64,
    pub items_invoiced: i64,
    pub items_to_restock: i64,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub last_invoice_date: Option<DateTime<Utc>>,
}

/// Filter for product list queries, applied over the derived counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockFilter {
    #[default]
    All,
    InStock,
    Invoiced,
    ToRestock,
}

/// Input for creating a new product with its initial unit batch.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// Input for editing a product. `quantity` is the desired in-stock count;
/// the reconciler grows or shrinks the unit pool to match it.
#[derive(Debug, Clone)]
pub struct EditProduct {
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
}
