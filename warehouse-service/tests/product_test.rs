//! Ledger store integration tests: product creation, lookup, listing and
//! edit-time stock reconciliation.

mod common;

use common::{add_test_product, spawn_db};
use rust_decimal::Decimal;
use std::str::FromStr;
use warehouse_core::error::AppError;
use warehouse_service::models::{EditProduct, NewProduct, StockFilter};

#[tokio::test]
async fn add_product_creates_units_and_projection() {
    let db = spawn_db().await;

    let product_id = add_test_product(&db, "Widget", 5, "10.00").await;

    let product = db.get_product(product_id).await.expect("get_product");
    assert_eq!(product.name, "Widget");
    assert_eq!(product.unit_price.to_string(), "10.00");

    let units = db.list_units(product_id).await.expect("list_units");
    assert_eq!(units.len(), 5);
    assert!(units.iter().all(|u| u.status == "in_stock"));
    assert!(units.iter().all(|u| !u.needs_restocking));

    let summaries = db.list_products(StockFilter::All).await.expect("list");
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.total_items, 5);
    assert_eq!(summary.items_in_stock, 5);
    assert_eq!(summary.items_sold, 0);
    assert_eq!(summary.items_invoiced, 0);
    assert_eq!(summary.items_to_restock, 0);
}

#[tokio::test]
async fn add_product_with_zero_quantity_is_valid() {
    let db = spawn_db().await;

    let product_id = add_test_product(&db, "Placeholder", 0, "1.00").await;

    let units = db.list_units(product_id).await.expect("list_units");
    assert!(units.is_empty());

    let summaries = db.list_products(StockFilter::All).await.expect("list");
    assert_eq!(summaries[0].total_items, 0);
}

#[tokio::test]
async fn add_product_rejects_bad_input() {
    let db = spawn_db().await;

    let err = db
        .add_product(&NewProduct {
            name: "  ".to_string(),
            description: None,
            quantity: 1,
            unit_price: Decimal::ONE,
        })
        .await
        .expect_err("empty name should fail");
    assert!(matches!(err, AppError::Validation(_)));

    let err = db
        .add_product(&NewProduct {
            name: "Widget".to_string(),
            description: None,
            quantity: -1,
            unit_price: Decimal::ONE,
        })
        .await
        .expect_err("negative quantity should fail");
    assert!(matches!(err, AppError::Validation(_)));

    let err = db
        .add_product(&NewProduct {
            name: "Widget".to_string(),
            description: None,
            quantity: 1,
            unit_price: Decimal::from_str("-0.01").unwrap(),
        })
        .await
        .expect_err("negative price should fail");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn get_product_returns_not_found_for_unknown_id() {
    let db = spawn_db().await;

    let err = db.get_product(999).await.expect_err("should be missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_products_filters_on_derived_counts() {
    let db = spawn_db().await;

    let stocked = add_test_product(&db, "Stocked", 3, "5.00").await;
    let depleted = add_test_product(&db, "Depleted", 2, "5.00").await;
    db.sell_product(depleted, 2).await.expect("sell");
    db.invoice_product(depleted).await.expect("invoice");

    let in_stock = db.list_products(StockFilter::InStock).await.expect("list");
    assert_eq!(in_stock.len(), 1);
    assert_eq!(in_stock[0].product_id, stocked);

    let invoiced = db.list_products(StockFilter::Invoiced).await.expect("list");
    assert_eq!(invoiced.len(), 1);
    assert_eq!(invoiced[0].product_id, depleted);

    let to_restock = db
        .list_products(StockFilter::ToRestock)
        .await
        .expect("list");
    assert!(to_restock.is_empty());
}

#[tokio::test]
async fn edit_product_grows_the_in_stock_pool() {
    let db = spawn_db().await;

    let product_id = add_test_product(&db, "Widget", 2, "10.00").await;

    db.edit_product(
        product_id,
        &EditProduct {
            name: "Widget v2".to_string(),
            description: Some("revised".to_string()),
            quantity: 6,
            unit_price: Decimal::from_str("12.50").unwrap(),
        },
    )
    .await
    .expect("edit");

    let product = db.get_product(product_id).await.expect("get_product");
    assert_eq!(product.name, "Widget v2");
    assert_eq!(product.unit_price.to_string(), "12.50");

    let summaries = db.list_products(StockFilter::All).await.expect("list");
    assert_eq!(summaries[0].items_in_stock, 6);
}

#[tokio::test]
async fn edit_product_shrinks_by_removing_oldest_in_stock_units() {
    let db = spawn_db().await;

    let product_id = add_test_product(&db, "Widget", 5, "10.00").await;
    db.sell_product(product_id, 2).await.expect("sell");

    db.edit_product(
        product_id,
        &EditProduct {
            name: "Widget".to_string(),
            description: None,
            quantity: 1,
            unit_price: Decimal::from_str("10.00").unwrap(),
        },
    )
    .await
    .expect("edit");

    let units = db.list_units(product_id).await.expect("list_units");
    let sold: Vec<_> = units.iter().filter(|u| u.status == "sold").collect();
    let in_stock: Vec<_> = units.iter().filter(|u| u.status == "in_stock").collect();
    assert_eq!(sold.len(), 2);
    assert_eq!(in_stock.len(), 1);

    // The two oldest in-stock units went; the survivor has the largest id.
    let max_id = units.iter().map(|u| u.unit_id).max().unwrap();
    assert_eq!(in_stock[0].unit_id, max_id);
}

#[tokio::test]
async fn edit_product_to_zero_stock_leaves_sold_units_alone() {
    let db = spawn_db().await;

    let product_id = add_test_product(&db, "Widget", 4, "10.00").await;
    db.sell_product(product_id, 3).await.expect("sell");

    db.edit_product(
        product_id,
        &EditProduct {
            name: "Widget".to_string(),
            description: None,
            quantity: 0,
            unit_price: Decimal::from_str("10.00").unwrap(),
        },
    )
    .await
    .expect("edit to zero");

    let summaries = db.list_products(StockFilter::All).await.expect("list");
    assert_eq!(summaries[0].items_in_stock, 0);
    assert_eq!(summaries[0].items_sold, 3);
    assert_eq!(summaries[0].total_items, 3);
}

#[tokio::test]
async fn edit_product_returns_not_found_for_unknown_id() {
    let db = spawn_db().await;

    let err = db
        .edit_product(
            42,
            &EditProduct {
                name: "Ghost".to_string(),
                description: None,
                quantity: 1,
                unit_price: Decimal::ONE,
            },
        )
        .await
        .expect_err("should be missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn clear_all_data_empties_every_table() {
    let db = spawn_db().await;

    let product_id = add_test_product(&db, "Widget", 3, "10.00").await;
    db.sell_product(product_id, 1).await.expect("sell");

    db.clear_all_data().await.expect("clear");

    let summaries = db.list_products(StockFilter::All).await.expect("list");
    assert!(summaries.is_empty());
    let invoices = db.list_invoices().await.expect("list_invoices");
    assert!(invoices.is_empty());
}
