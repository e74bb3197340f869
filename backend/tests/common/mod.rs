//! Fixtures shared by the database-backed tests

#![allow(dead_code)]

use std::str::FromStr;

use rust_decimal::Decimal;
use shared::{
    Category, CreateCategoryInput, CreateProductInput, CreateSaleInput, CreateStoreInput,
    LineItemInput, Product, SetStockInput, Store,
};
use sqlx::PgPool;
use stockroom_backend::config::ImportConfig;
use stockroom_backend::services::{
    CategoryService, InventoryService, ProductService, SaleService, StoreService,
};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn import_defaults() -> ImportConfig {
    ImportConfig {
        default_store_name: "Main Store".into(),
        default_store_code: "MAIN".into(),
        default_category_name: "General".into(),
        default_min_stock: 10,
    }
}

pub async fn category(pool: &PgPool, name: &str, parent_id: Option<i64>) -> Category {
    CategoryService::new(pool.clone())
        .create_category(CreateCategoryInput {
            name: name.into(),
            description: None,
            icon: None,
            color: None,
            parent_id,
            sort_order: None,
        })
        .await
        .unwrap()
}

pub async fn store(pool: &PgPool, name: &str, code: &str) -> Store {
    StoreService::new(pool.clone())
        .create_store(CreateStoreInput {
            name: name.into(),
            code: code.into(),
            address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62701".into(),
            country: None,
            phone: None,
            email: None,
            manager_name: None,
            image: None,
            timezone: None,
            operating_hours: None,
        })
        .await
        .unwrap()
}

pub async fn product(
    pool: &PgPool,
    code: &str,
    category_id: i64,
    selling_price: &str,
    cost_price: Option<&str>,
    min_stock_level: i32,
) -> Product {
    ProductService::new(pool.clone())
        .create_product(CreateProductInput {
            name: Some(format!("Product {}", code)),
            code: Some(code.into()),
            category_id: Some(category_id),
            selling_price: Some(dec(selling_price)),
            cost_price: cost_price.map(dec),
            min_stock_level: Some(min_stock_level),
            ..Default::default()
        })
        .await
        .unwrap()
}

pub async fn set_stock(pool: &PgPool, product_id: i64, store_id: i64, quantity: i32) {
    InventoryService::new(pool.clone())
        .set_stock(
            product_id,
            store_id,
            SetStockInput {
                quantity,
                min_stock: None,
                max_stock: None,
            },
        )
        .await
        .unwrap();
}

pub fn sale_input(store_id: i64, lines: &[(i64, i32)]) -> CreateSaleInput {
    CreateSaleInput {
        store_id,
        items: lines
            .iter()
            .map(|&(product_id, quantity)| LineItemInput {
                product_id,
                quantity,
            })
            .collect(),
        customer_name: None,
        payment_method: None,
        notes: None,
    }
}

pub async fn quantity(pool: &PgPool, product_id: i64, store_id: i64) -> i32 {
    InventoryService::new(pool.clone())
        .get_stock(product_id, store_id)
        .await
        .unwrap()
        .record
        .quantity
}

pub fn sales(pool: &PgPool) -> SaleService {
    SaleService::new(pool.clone())
}
