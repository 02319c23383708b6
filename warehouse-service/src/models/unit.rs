//! Stock unit model: one physical instance of a product.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Unit lifecycle status. Status partitions a product's unit set:
/// `in_stock + sold + invoiced == total` after every committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    InStock,
    Sold,
    Invoiced,
}

impl UnitStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::InStock => "in_stock",
            UnitStatus::Sold => "sold",
            UnitStatus::Invoiced => "invoiced",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "in_stock" => Some(UnitStatus::InStock),
            "sold" => Some(UnitStatus::Sold),
            "invoiced" => Some(UnitStatus::Invoiced),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single tracked unit. `unit_id` is the creation-order key used for FIFO
/// allocation; `invoice_id` back-references the invoice the unit was
/// allocated to, if any.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockUnit {
    pub unit_id: i64,
    pub product_id: i64,
    pub status: String,
    pub sale_date: Option<DateTime<Utc>>,
    pub invoice_date: Option<DateTime<Utc>>,
    pub invoice_id: Option<i64>,
    pub needs_restocking: bool,
    pub created_utc: DateTime<Utc>,
}

impl StockUnit {
    /// Get parsed status.
    pub fn parsed_status(&self) -> Option<UnitStatus> {
        UnitStatus::from_string(&self.status)
    }
}
