//! Warehouse engine - item-level inventory ledger and invoice allocation.
//!
//! The engine tracks physical stock as individual units, allocates units to
//! customer invoices (creating backorder units on shortfall) and reconciles
//! the unit pool when a product's declared quantity changes or backorders are
//! restocked. The presentation layer calls the public [`services::Database`]
//! operations; every multi-step operation runs inside a single transaction.

pub mod clock;
pub mod models;
pub mod services;
