//! Inventory ledger service: one stock record per (product, store)
//!
//! Every relative change goes through [`adjust_locked`], which holds the
//! record's row lock for the rest of the surrounding transaction, so
//! concurrent adjustments of one record serialize across service instances.

use rust_decimal::Decimal;
use shared::{
    apply_delta, AdjustStockInput, InventoryRecord, LowStockItem, ProductStatus, SetStockInput,
    StockLevel,
};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};

pub(crate) const RECORD_COLUMNS: &str = "product_id, store_id, quantity, min_stock, max_stock, last_updated";

/// Inventory service for the stock ledger
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Product fields that govern its stock records
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockPolicy {
    pub id: i64,
    pub name: String,
    pub status: ProductStatus,
    pub selling_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub min_stock_level: i32,
    pub max_stock_level: Option<i32>,
    pub track_inventory: bool,
    pub allow_backorder: bool,
}

const POLICY_COLUMNS: &str = "id, name, status, selling_price, cost_price, min_stock_level, \
     max_stock_level, track_inventory, allow_backorder";

impl InventoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stock of a product at a store. A product never stocked there reads as
    /// a zero-quantity record with the product's thresholds.
    pub async fn get_stock(&self, product_id: i64, store_id: i64) -> AppResult<StockLevel> {
        let policy = load_policy(&self.db, product_id).await?;
        ensure_store(&self.db, store_id).await?;

        let record = sqlx::query_as::<_, InventoryRecord>(&format!(
            "SELECT {} FROM inventory WHERE product_id = $1 AND store_id = $2",
            RECORD_COLUMNS
        ))
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.db)
        .await?
        .unwrap_or_else(|| {
            InventoryRecord::synthetic(
                product_id,
                store_id,
                policy.min_stock_level,
                policy.max_stock_level,
            )
        });

        Ok(record.level())
    }

    /// Apply a relative change atomically
    pub async fn adjust_stock(
        &self,
        product_id: i64,
        store_id: i64,
        input: AdjustStockInput,
    ) -> AppResult<StockLevel> {
        if input.delta == 0 {
            return Err(AppError::field("delta", "Adjustment must not be zero"));
        }

        let mut tx = self.db.begin().await?;
        let policy = load_policy(&mut *tx, product_id).await?;
        ensure_store(&mut *tx, store_id).await?;

        let record = adjust_locked(&mut *tx, &policy, store_id, input.delta).await?;
        tx.commit().await?;

        tracing::info!(
            product_id,
            store_id,
            delta = input.delta,
            quantity = record.quantity,
            reason = input.reason.as_deref().unwrap_or(""),
            "Stock adjusted"
        );
        Ok(record.level())
    }

    /// Administrative absolute set; bypasses the backorder rule
    pub async fn set_stock(
        &self,
        product_id: i64,
        store_id: i64,
        input: SetStockInput,
    ) -> AppResult<StockLevel> {
        let mut errors = Vec::new();
        if input.quantity < 0 {
            errors.push(shared::FieldError::new("quantity", "Quantity cannot be negative"));
        }
        if input.min_stock.is_some_and(|m| m < 0) {
            errors.push(shared::FieldError::new("min_stock", "Minimum stock cannot be negative"));
        }
        errors.extend(shared::check_stock_bounds(input.min_stock, input.max_stock, "max_stock"));
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let policy = load_policy(&self.db, product_id).await?;
        ensure_store(&self.db, store_id).await?;

        let record = set_quantity(
            &mut *self.db.acquire().await?,
            &policy,
            store_id,
            input.quantity,
            input.min_stock,
            input.max_stock,
        )
        .await?;

        tracing::info!(product_id, store_id, quantity = record.quantity, "Stock set");
        Ok(record.level())
    }

    /// Records at or below their threshold, active products only, lowest first
    pub async fn low_stock_report(&self, store_id: Option<i64>) -> AppResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT i.product_id, p.name AS product_name, p.code AS product_code,
                   i.store_id, s.name AS store_name, i.quantity, i.min_stock
            FROM inventory i
            JOIN products p ON p.id = i.product_id
            JOIN stores s ON s.id = i.store_id
            WHERE i.quantity <= i.min_stock
              AND p.status = 'active'
              AND p.track_inventory
              AND s.is_active
              AND ($1::BIGINT IS NULL OR i.store_id = $1)
            ORDER BY i.quantity, i.product_id, i.store_id
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }
}

/// Load a product's stock policy
pub(crate) async fn load_policy<'c, E>(executor: E, product_id: i64) -> AppResult<StockPolicy>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query_as::<_, StockPolicy>(&format!(
        "SELECT {} FROM products WHERE id = $1",
        POLICY_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::not_found(format!("Product {}", product_id)))
}

pub(crate) async fn ensure_store<'c, E>(executor: E, store_id: i64) -> AppResult<()>
where
    E: sqlx::PgExecutor<'c>,
{
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1)")
        .bind(store_id)
        .fetch_one(executor)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::not_found(format!("Store {}", store_id)))
    }
}

/// Check-then-apply `delta` under the record's row lock.
///
/// Must run inside a transaction; the lock is held until it ends. A missing
/// record is created at zero with the product's thresholds first.
pub(crate) async fn adjust_locked(
    conn: &mut PgConnection,
    policy: &StockPolicy,
    store_id: i64,
    delta: i32,
) -> AppResult<InventoryRecord> {
    sqlx::query(
        r#"
        INSERT INTO inventory (product_id, store_id, quantity, min_stock, max_stock)
        VALUES ($1, $2, 0, $3, $4)
        ON CONFLICT (product_id, store_id) DO NOTHING
        "#,
    )
    .bind(policy.id)
    .bind(store_id)
    .bind(policy.min_stock_level)
    .bind(policy.max_stock_level)
    .execute(&mut *conn)
    .await?;

    let current = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM inventory WHERE product_id = $1 AND store_id = $2 FOR UPDATE",
    )
    .bind(policy.id)
    .bind(store_id)
    .fetch_one(&mut *conn)
    .await?;

    let next = apply_delta(current, delta, policy.allow_backorder).map_err(|err| {
        tracing::warn!(
            product_id = policy.id,
            store_id,
            current,
            delta,
            "Stock adjustment rejected"
        );
        AppError::from_stock(policy.id, err)
    })?;

    let record = sqlx::query_as::<_, InventoryRecord>(&format!(
        r#"
        UPDATE inventory SET quantity = $3, last_updated = NOW()
        WHERE product_id = $1 AND store_id = $2
        RETURNING {}
        "#,
        RECORD_COLUMNS
    ))
    .bind(policy.id)
    .bind(store_id)
    .bind(next)
    .fetch_one(&mut *conn)
    .await?;

    Ok(record)
}

/// Upsert an absolute quantity; thresholds fall back to the existing record,
/// then to the product's defaults
pub(crate) async fn set_quantity(
    conn: &mut PgConnection,
    policy: &StockPolicy,
    store_id: i64,
    quantity: i32,
    min_stock: Option<i32>,
    max_stock: Option<i32>,
) -> AppResult<InventoryRecord> {
    let record = sqlx::query_as::<_, InventoryRecord>(&format!(
        r#"
        INSERT INTO inventory (product_id, store_id, quantity, min_stock, max_stock)
        VALUES ($1, $2, $3, COALESCE($4, $6), COALESCE($5, $7))
        ON CONFLICT (product_id, store_id) DO UPDATE SET
            quantity = EXCLUDED.quantity,
            min_stock = COALESCE($4, inventory.min_stock),
            max_stock = COALESCE($5, inventory.max_stock),
            last_updated = NOW()
        RETURNING {}
        "#,
        RECORD_COLUMNS
    ))
    .bind(policy.id)
    .bind(store_id)
    .bind(quantity)
    .bind(min_stock)
    .bind(max_stock)
    .bind(policy.min_stock_level)
    .bind(policy.max_stock_level)
    .fetch_one(&mut *conn)
    .await?;

    Ok(record)
}
