//! Common test utilities for warehouse-service integration tests.

use std::str::FromStr;
use std::sync::{Arc, Once};

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use warehouse_service::clock::FixedClock;
use warehouse_service::models::NewProduct;
use warehouse_service::services::Database;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,warehouse_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Spawn a migrated in-memory database with a fixed clock.
///
/// A single connection keeps every query on the same in-memory database;
/// `sqlite::memory:` gives each connection its own otherwise.
pub async fn spawn_db() -> Database {
    init_tracing();

    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));

    let db = Database::with_clock("sqlite::memory:", 1, 1, clock)
        .await
        .expect("Failed to open in-memory database");

    db.run_migrations().await.expect("Failed to run migrations");

    db
}

/// Helper to create a product with an initial unit batch.
pub async fn add_test_product(db: &Database, name: &str, quantity: i64, price: &str) -> i64 {
    db.add_product(&NewProduct {
        name: name.to_string(),
        description: None,
        quantity,
        unit_price: Decimal::from_str(price).expect("Invalid test price"),
    })
    .await
    .expect("Failed to add product")
}
