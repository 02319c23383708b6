//! Prometheus metrics for the warehouse engine.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};

/// Database operation duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "warehouse_db_query_duration_seconds",
        "Database operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Products created.
pub static PRODUCTS_CREATED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "warehouse_products_created_total",
        "Total number of products created"
    )
    .expect("Failed to register products_created")
});

/// Invoice issuance outcomes.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "warehouse_invoices_total",
        "Total number of invoice issuance attempts",
        &["status"] // ok, error
    )
    .expect("Failed to register invoices_total")
});

/// Units transitioned by the allocation engine.
pub static UNITS_ALLOCATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "warehouse_units_allocated_total",
        "Total number of stock units transitioned",
        &["transition"] // sold, invoiced, restocked
    )
    .expect("Failed to register units_allocated")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&PRODUCTS_CREATED);
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&UNITS_ALLOCATED);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
