//! Store service

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    CreateStoreInput, PaginatedResponse, Pagination, StockStatus, Store, StoreFilter,
    StoreWithStats, UpdateStoreInput,
};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

pub const STORE_COLUMNS: &str = "id, name, code, address, city, state, postal_code, country, phone, \
     email, manager_name, image, timezone, operating_hours, is_active, created_at, updated_at";

/// Store service
#[derive(Clone)]
pub struct StoreService {
    db: PgPool,
}

/// Row for store detail query
#[derive(sqlx::FromRow)]
struct StoreStatsRow {
    employees_count: i64,
    unique_products_count: i64,
    total_units_on_hand: i64,
    low_stock_items_count: i64,
    revenue_today: Decimal,
    revenue_this_month: Decimal,
}

/// A product as carried by one store
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreProduct {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub category_id: i64,
    pub selling_price: Decimal,
    pub quantity: i32,
    pub min_stock: i32,
    pub max_stock: Option<i32>,
    #[sqlx(skip)]
    pub stock_status: Option<StockStatus>,
}

impl StoreService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_stores(
        &self,
        filter: &StoreFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Store>> {
        let search = filter.search.as_deref().map(|s| format!("%{}%", s.trim()));
        let where_clause = r#"
            WHERE ($1::BOOLEAN IS NULL OR is_active = $1)
              AND ($2::TEXT IS NULL OR name ILIKE $2 OR code ILIKE $2 OR city ILIKE $2)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM stores {}", where_clause))
            .bind(filter.is_active)
            .bind(&search)
            .fetch_one(&self.db)
            .await?;

        let stores = sqlx::query_as::<_, Store>(&format!(
            "SELECT {} FROM stores {} ORDER BY id LIMIT $3 OFFSET $4",
            STORE_COLUMNS, where_clause
        ))
        .bind(filter.is_active)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(stores, pagination, total as u64))
    }

    pub async fn find(&self, store_id: i64) -> AppResult<Store> {
        sqlx::query_as::<_, Store>(&format!("SELECT {} FROM stores WHERE id = $1", STORE_COLUMNS))
            .bind(store_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Store"))
    }

    /// Store with figures derived from users, inventory and sales
    pub async fn get_store(&self, store_id: i64) -> AppResult<StoreWithStats> {
        let store = self.find(store_id).await?;
        let stats = sqlx::query_as::<_, StoreStatsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE store_id = $1 AND is_active) AS employees_count,
                (SELECT COUNT(*) FROM inventory WHERE store_id = $1 AND quantity > 0) AS unique_products_count,
                COALESCE((SELECT SUM(quantity) FROM inventory WHERE store_id = $1), 0)::BIGINT AS total_units_on_hand,
                (SELECT COUNT(*) FROM inventory i
                   JOIN products p ON p.id = i.product_id
                  WHERE i.store_id = $1 AND p.status = 'active'
                    AND i.quantity <= i.min_stock) AS low_stock_items_count,
                COALESCE((SELECT SUM(si.quantity * si.unit_price) FROM sale_items si
                            JOIN sales s ON s.id = si.sale_id
                           WHERE s.store_id = $1 AND s.status <> 'refunded'
                             AND (s.sale_date AT TIME ZONE 'UTC')::DATE = (NOW() AT TIME ZONE 'UTC')::DATE), 0)
                    AS revenue_today,
                COALESCE((SELECT SUM(si.quantity * si.unit_price) FROM sale_items si
                            JOIN sales s ON s.id = si.sale_id
                           WHERE s.store_id = $1 AND s.status <> 'refunded'
                             AND DATE_TRUNC('month', s.sale_date AT TIME ZONE 'UTC')
                                 = DATE_TRUNC('month', NOW() AT TIME ZONE 'UTC')), 0)
                    AS revenue_this_month
            "#,
        )
        .bind(store_id)
        .fetch_one(&self.db)
        .await?;

        Ok(StoreWithStats {
            full_address: store.full_address(),
            store,
            employees_count: stats.employees_count,
            unique_products_count: stats.unique_products_count,
            total_units_on_hand: stats.total_units_on_hand,
            low_stock_items_count: stats.low_stock_items_count,
            revenue_today: stats.revenue_today,
            revenue_this_month: stats.revenue_this_month,
        })
    }

    /// Active products stocked at a store, with their derived stock status
    pub async fn store_products(
        &self,
        store_id: i64,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<StoreProduct>> {
        self.find(store_id).await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM inventory i
            JOIN products p ON p.id = i.product_id
            WHERE i.store_id = $1 AND p.status = 'active'
            "#,
        )
        .bind(store_id)
        .fetch_one(&self.db)
        .await?;

        let mut rows = sqlx::query_as::<_, StoreProduct>(
            r#"
            SELECT p.id AS product_id, p.code, p.name, p.category_id, p.selling_price,
                   i.quantity, i.min_stock, i.max_stock
            FROM inventory i
            JOIN products p ON p.id = i.product_id
            WHERE i.store_id = $1 AND p.status = 'active'
            ORDER BY p.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(store_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        for row in &mut rows {
            row.stock_status = Some(StockStatus::classify(row.quantity, row.min_stock));
        }

        Ok(PaginatedResponse::new(rows, pagination, total as u64))
    }

    pub async fn create_store(&self, input: CreateStoreInput) -> AppResult<Store> {
        input.check()?;

        let store = sqlx::query_as::<_, Store>(&format!(
            r#"
            INSERT INTO stores (name, code, address, city, state, postal_code, country, phone,
                                email, manager_name, image, timezone, operating_hours)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'USA'), $8, $9, $10, $11,
                    COALESCE($12, 'UTC'), $13)
            RETURNING {}
            "#,
            STORE_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.code)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.manager_name)
        .bind(&input.image)
        .bind(&input.timezone)
        .bind(&input.operating_hours)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(store_id = store.id, code = %store.code, "Store created");
        Ok(store)
    }

    pub async fn update_store(&self, store_id: i64, input: UpdateStoreInput) -> AppResult<Store> {
        input.check()?;

        let store = sqlx::query_as::<_, Store>(&format!(
            r#"
            UPDATE stores SET
                name = COALESCE($2, name),
                code = COALESCE($3, code),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                state = COALESCE($6, state),
                postal_code = COALESCE($7, postal_code),
                country = COALESCE($8, country),
                phone = COALESCE($9, phone),
                email = COALESCE($10, email),
                manager_name = COALESCE($11, manager_name),
                image = COALESCE($12, image),
                timezone = COALESCE($13, timezone),
                operating_hours = COALESCE($14, operating_hours),
                is_active = COALESCE($15, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STORE_COLUMNS
        ))
        .bind(store_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.code)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.manager_name)
        .bind(&input.image)
        .bind(&input.timezone)
        .bind(&input.operating_hours)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Store"))?;

        tracing::info!(store_id, "Store updated");
        Ok(store)
    }

    /// Soft delete; inventory records are kept. Idempotent.
    pub async fn deactivate_store(&self, store_id: i64) -> AppResult<Store> {
        let store = sqlx::query_as::<_, Store>(&format!(
            "UPDATE stores SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            STORE_COLUMNS
        ))
        .bind(store_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Store"))?;

        tracing::info!(store_id, "Store deactivated");
        Ok(store)
    }
}
