//! Inventory ledger tests against PostgreSQL
//!
//! Need `DATABASE_URL`; run with `cargo test -- --ignored`.

mod common;

use common::*;
use shared::{AdjustStockInput, SaleStatus, SetStockInput, StockStatus};
use sqlx::PgPool;
use stockroom_backend::services::InventoryService;
use stockroom_backend::AppError;

fn adjust(delta: i32) -> AdjustStockInput {
    AdjustStockInput {
        delta,
        reason: None,
    }
}

/// Stock flags follow a sale and its refund
#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_low_stock_sale_and_refund(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let s1 = store(&pool, "Store One", "S1").await;
    let p1 = product(&pool, "SKU1", cat.id, "10", None, 5).await;

    set_stock(&pool, p1.id, s1.id, 5).await;
    let level = InventoryService::new(pool.clone()).get_stock(p1.id, s1.id).await.unwrap();
    assert!(level.is_low_stock);
    assert!(!level.is_out_of_stock);
    assert_eq!(level.status, StockStatus::LowStock);

    let sale = sales(&pool)
        .create_sale(None, sale_input(s1.id, &[(p1.id, 5)]))
        .await
        .unwrap();
    let level = InventoryService::new(pool.clone()).get_stock(p1.id, s1.id).await.unwrap();
    assert_eq!(level.record.quantity, 0);
    assert!(level.is_out_of_stock);

    sales(&pool)
        .transition_status(sale.sale.id, SaleStatus::Refunded)
        .await
        .unwrap();
    assert_eq!(quantity(&pool, p1.id, s1.id).await, 5);
}

/// N concurrent single-unit decrements against K units: exactly min(N, K) succeed
#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_adjustments_never_oversell(pool: PgPool) {
    const N: usize = 8;
    const K: i32 = 5;

    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "RACE-1", cat.id, "3", None, 1).await;
    set_stock(&pool, p.id, st.id, K).await;

    let service = InventoryService::new(pool.clone());
    let handles: Vec<_> = (0..N)
        .map(|_| {
            let service = service.clone();
            let (product_id, store_id) = (p.id, st.id);
            tokio::spawn(async move { service.adjust_stock(product_id, store_id, adjust(-1)).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::InsufficientStock { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    let expected = N.min(K as usize);
    assert_eq!(succeeded, expected);
    assert_eq!(rejected, N - expected);
    assert_eq!(quantity(&pool, p.id, st.id).await, K - expected as i32);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_adjustment_below_zero_is_rejected_and_leaves_stock(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "NEG-1", cat.id, "3", None, 1).await;
    set_stock(&pool, p.id, st.id, 2).await;

    let err = InventoryService::new(pool.clone())
        .adjust_stock(p.id, st.id, adjust(-3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            available: 2,
            requested: 3,
            ..
        }
    ));
    assert_eq!(quantity(&pool, p.id, st.id).await, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_backorder_product_may_go_negative(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "BO-1", cat.id, "3", None, 1).await;
    sqlx::query("UPDATE products SET allow_backorder = TRUE WHERE id = $1")
        .bind(p.id)
        .execute(&pool)
        .await
        .unwrap();

    let level = InventoryService::new(pool.clone())
        .adjust_stock(p.id, st.id, adjust(-4))
        .await
        .unwrap();
    assert_eq!(level.record.quantity, -4);
    assert!(level.is_out_of_stock);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_unstocked_pair_reads_as_zero(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "NEW-1", cat.id, "3", None, 7).await;

    let level = InventoryService::new(pool.clone()).get_stock(p.id, st.id).await.unwrap();
    assert_eq!(level.record.quantity, 0);
    assert_eq!(level.record.min_stock, 7);
    assert!(level.record.last_updated.is_none());
    assert!(level.is_out_of_stock);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_zero_delta_and_negative_set_are_validation_errors(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "VAL-1", cat.id, "3", None, 1).await;
    let service = InventoryService::new(pool.clone());

    let err = service.adjust_stock(p.id, st.id, adjust(0)).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = service
        .set_stock(
            p.id,
            st.id,
            SetStockInput {
                quantity: -1,
                min_stock: Some(5),
                max_stock: Some(2),
            },
        )
        .await
        .unwrap_err();
    match err {
        AppError::Validation(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(names, vec!["quantity", "max_stock"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_low_stock_report_lists_lowest_first(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let low = product(&pool, "LOW-1", cat.id, "3", None, 5).await;
    let empty = product(&pool, "OUT-1", cat.id, "3", None, 5).await;
    let plenty = product(&pool, "OK-1", cat.id, "3", None, 5).await;
    set_stock(&pool, low.id, st.id, 3).await;
    set_stock(&pool, empty.id, st.id, 0).await;
    set_stock(&pool, plenty.id, st.id, 50).await;

    let report = InventoryService::new(pool.clone())
        .low_stock_report(Some(st.id))
        .await
        .unwrap();
    let ids: Vec<i64> = report.iter().map(|r| r.product_id).collect();
    assert_eq!(ids, vec![empty.id, low.id]);
}
