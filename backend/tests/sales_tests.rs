//! Sales record tests against PostgreSQL

mod common;

use common::*;
use shared::{Pagination, ProductStatus, SaleFilter, SaleStatus, UpdateProductInput};
use sqlx::PgPool;
use stockroom_backend::services::ProductService;
use stockroom_backend::AppError;

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_line_prices_are_snapshots(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "SNAP-1", cat.id, "10.00", Some("6.00"), 1).await;
    set_stock(&pool, p.id, st.id, 10).await;

    let sale = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 2)]))
        .await
        .unwrap();
    assert_eq!(sale.sale.status, SaleStatus::Confirmed);
    assert_eq!(sale.total_amount, dec("20.00"));
    assert!(sale.sale.order_number.starts_with("SO-"));

    ProductService::new(pool.clone())
        .update_product(
            p.id,
            UpdateProductInput {
                selling_price: Some(dec("15.00")),
                cost_price: Some(Some(dec("9.00"))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reread = sales(&pool).get_sale(sale.sale.id).await.unwrap();
    assert_eq!(reread.items[0].unit_price, dec("10.00"));
    assert_eq!(reread.items[0].unit_cost, Some(dec("6.00")));
    assert_eq!(reread.total_amount, dec("20.00"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_failing_line_rolls_back_the_whole_sale(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let plenty = product(&pool, "MANY-1", cat.id, "5", None, 1).await;
    let scarce = product(&pool, "FEW-1", cat.id, "5", None, 1).await;
    set_stock(&pool, plenty.id, st.id, 10).await;
    set_stock(&pool, scarce.id, st.id, 1).await;

    let err = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(plenty.id, 3), (scarce.id, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { product_id, .. } if product_id == scarce.id));

    assert_eq!(quantity(&pool, plenty.id, st.id).await, 10);
    assert_eq!(quantity(&pool, scarce.id, st.id).await, 1);
    let listed = sales(&pool)
        .list_sales(&SaleFilter::default(), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.pagination.total_items, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_lines_are_checked_together(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "DUP-1", cat.id, "5", None, 1).await;
    set_stock(&pool, p.id, st.id, 3).await;

    let err = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 2), (p.id, 2)]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");

    let sale = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 1), (p.id, 2)]))
        .await
        .unwrap();
    assert_eq!(sale.items.len(), 2);
    assert_eq!(sale.total_units, 3);
    assert_eq!(quantity(&pool, p.id, st.id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_inactive_product_is_a_line_error(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "OLD-1", cat.id, "5", None, 1).await;
    set_stock(&pool, p.id, st.id, 3).await;
    let retired = ProductService::new(pool.clone()).deactivate_product(p.id).await.unwrap();
    assert_eq!(retired.status, ProductStatus::Inactive);

    let err = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 1), (i64::MAX, 1)]))
        .await
        .unwrap_err();
    match err {
        AppError::Validation(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(names, vec!["items[0].product_id", "items[1].product_id"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(quantity(&pool, p.id, st.id).await, 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_status_lifecycle(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "LIFE-1", cat.id, "5", None, 1).await;
    set_stock(&pool, p.id, st.id, 10).await;

    let sale = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 4)]))
        .await
        .unwrap();
    let id = sale.sale.id;

    let packed = sales(&pool).transition_status(id, SaleStatus::Packed).await.unwrap();
    assert_eq!(packed.sale.status, SaleStatus::Packed);
    assert!(packed.sale.packed_at.is_some());

    let err = sales(&pool)
        .transition_status(id, SaleStatus::Confirmed)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    let shipped = sales(&pool).transition_status(id, SaleStatus::Shipped).await.unwrap();
    assert!(shipped.sale.shipped_at.is_some());

    // shipped is terminal: no refund, stock untouched
    let err = sales(&pool)
        .transition_status(id, SaleStatus::Refunded)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
    assert_eq!(quantity(&pool, p.id, st.id).await, 6);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_refund_happens_once(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "ONCE-1", cat.id, "5", None, 1).await;
    set_stock(&pool, p.id, st.id, 4).await;

    let sale = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 4)]))
        .await
        .unwrap();
    sales(&pool)
        .transition_status(sale.sale.id, SaleStatus::Packed)
        .await
        .unwrap();
    let refunded = sales(&pool)
        .transition_status(sale.sale.id, SaleStatus::Refunded)
        .await
        .unwrap();
    assert!(refunded.sale.refunded_at.is_some());
    assert_eq!(quantity(&pool, p.id, st.id).await, 4);

    assert!(sales(&pool)
        .transition_status(sale.sale.id, SaleStatus::Refunded)
        .await
        .is_err());
    assert_eq!(quantity(&pool, p.id, st.id).await, 4);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_list_filters_by_status(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "LIST-1", cat.id, "5", None, 1).await;
    set_stock(&pool, p.id, st.id, 10).await;

    let first = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 1)]))
        .await
        .unwrap();
    sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 1)]))
        .await
        .unwrap();
    sales(&pool)
        .transition_status(first.sale.id, SaleStatus::Refunded)
        .await
        .unwrap();

    let filter = SaleFilter {
        status: Some(SaleStatus::Refunded),
        ..Default::default()
    };
    let listed = sales(&pool)
        .list_sales(&filter, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.pagination.total_items, 1);
    assert_eq!(listed.data[0].sale.id, first.sale.id);
    assert_eq!(listed.data[0].items.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_merged_lines_past_i32_are_rejected(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let st = store(&pool, "Store One", "S1").await;
    let p = product(&pool, "HUGE-1", cat.id, "1", None, 1).await;
    ProductService::new(pool.clone())
        .update_product(
            p.id,
            UpdateProductInput {
                allow_backorder: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = sales(&pool)
        .create_sale(None, sale_input(st.id, &[(p.id, 2_000_000_000), (p.id, 2_000_000_000)]))
        .await
        .unwrap_err();
    match err {
        AppError::Validation(fields) => assert!(fields.iter().any(|f| f.field == "items")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(quantity(&pool, p.id, st.id).await, 0);
    let listed = sales(&pool)
        .list_sales(&SaleFilter::default(), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(listed.pagination.total_items, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_product_cost_can_be_cleared(pool: PgPool) {
    let cat = category(&pool, "Misc", None).await;
    let p = product(&pool, "CLR-1", cat.id, "10", Some("6"), 1).await;
    let products = ProductService::new(pool.clone());

    let renamed = products
        .update_product(
            p.id,
            UpdateProductInput {
                name: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.cost_price, Some(dec("6")));

    let cleared = products
        .update_product(
            p.id,
            UpdateProductInput {
                cost_price: Some(None),
                max_stock_level: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.cost_price, None);
    assert_eq!(cleared.max_stock_level, None);
    assert_eq!(cleared.name, "Renamed");
}
