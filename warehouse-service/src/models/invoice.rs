//! Invoice header and line models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::money::Money;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "issued" => InvoiceStatus::Issued,
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Invoice header. `total_amount` is computed once at issuance and stored;
/// it is immutable afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: i64,
    pub invoice_number: String,
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

impl Invoice {
    /// Get parsed status.
    pub fn parsed_status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }
}

/// Invoice line. `unit_price` is a snapshot taken at issuance time, not a
/// live link to the product's current price; `total_price` is exactly
/// `quantity * unit_price`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_id: i64,
    pub invoice_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

/// Invoice line joined with its product name, for display.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InvoiceLineDetail {
    pub line_id: i64,
    pub invoice_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

/// Invoice header plus its lines in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLineDetail>,
}

/// One requested line of a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoiceLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// Input for issuing an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<NewInvoiceLine>,
}
