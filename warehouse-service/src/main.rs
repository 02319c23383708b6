use warehouse_core::config::Config;
use warehouse_core::observability::init_tracing;
use warehouse_service::models::StockFilter;
use warehouse_service::services::{get_metrics, init_metrics, Database};

/// Bootstrap the warehouse ledger: open (or create) the database file, apply
/// migrations, and verify the store is healthy. The engine itself is consumed
/// as a library; this binary is the explicit initialization entry point.
#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing("warehouse-service", &config.log_level);

    let db = Database::from_config(&config.database).await.map_err(|e| {
        tracing::error!("Failed to open database: {}", e);
        std::io::Error::other(format!("Database connection error: {}", e))
    })?;

    db.run_migrations().await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::other(format!("Database initialization error: {}", e))
    })?;

    db.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        std::io::Error::other(format!("Health check error: {}", e))
    })?;

    let products = db.list_products(StockFilter::All).await.map_err(|e| {
        tracing::error!("Failed to list products: {}", e);
        std::io::Error::other(format!("Query error: {}", e))
    })?;

    tracing::info!(
        url = %config.database.url,
        products = products.len(),
        "Warehouse ledger ready"
    );

    // No scrape endpoint in a single-desktop deployment; dump the counters
    // gathered during bootstrap instead.
    tracing::debug!(snapshot = %get_metrics(), "Bootstrap metrics");

    Ok(())
}
