pub mod allocation;
pub mod database;
pub mod invoicing;
pub mod metrics;
pub mod reconcile;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
