//! Sales service: all-or-nothing sale creation and the fulfilment state machine

use std::collections::BTreeMap;

use chrono::Utc;
use shared::{
    order_number, CreateSaleInput, FieldError, PaginatedResponse, Pagination, ProductStatus, Sale,
    SaleFilter, SaleLineItem, SaleStatus, SaleWithItems,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::inventory::{adjust_locked, load_policy, StockPolicy};

pub(crate) const SALE_COLUMNS: &str = "id, order_number, store_id, status, customer_name, payment_method, \
     notes, sold_by_user_id, sale_date, packed_at, shipped_at, refunded_at, created_at, updated_at";

pub(crate) const ITEM_COLUMNS: &str = "id, sale_id, product_id, quantity, unit_price, unit_cost";

/// Sales service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
}

impl SaleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a sale and decrement stock for every line in one transaction.
    ///
    /// Prices and costs are snapshotted from the products; any failing line
    /// rolls the whole sale back.
    pub async fn create_sale(&self, sold_by: Option<i64>, input: CreateSaleInput) -> AppResult<SaleWithItems> {
        input.check()?;

        let mut tx = self.db.begin().await?;

        let store_active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM stores WHERE id = $1")
            .bind(input.store_id)
            .fetch_optional(&mut *tx)
            .await?;
        match store_active {
            Some(true) => {}
            Some(false) => return Err(AppError::field("store_id", "Store is inactive")),
            None => return Err(AppError::not_found(format!("Store {}", input.store_id))),
        }

        // resolve every product before touching stock so all bad lines are reported
        let mut policies = BTreeMap::<i64, StockPolicy>::new();
        let mut errors = Vec::new();
        for (idx, item) in input.items.iter().enumerate() {
            if policies.contains_key(&item.product_id) {
                continue;
            }
            match load_policy(&mut *tx, item.product_id).await {
                Ok(policy) if policy.status == ProductStatus::Active => {
                    policies.insert(policy.id, policy);
                }
                Ok(_) => errors.push(FieldError::new(
                    format!("items[{}].product_id", idx),
                    "Product is inactive",
                )),
                Err(AppError::NotFound(_)) => errors.push(FieldError::new(
                    format!("items[{}].product_id", idx),
                    "Product does not exist",
                )),
                Err(other) => return Err(other),
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        // ascending product id: concurrent sales take row locks in the same order
        for (product_id, quantity) in input
            .quantities_by_product()
            .map_err(|err| AppError::Validation(vec![err]))?
        {
            let policy = policies
                .get(&product_id)
                .ok_or_else(|| AppError::Internal(format!("Product {} not resolved", product_id)))?;
            if policy.track_inventory {
                adjust_locked(&mut *tx, policy, input.store_id, -quantity).await?;
            }
        }

        let now = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        let sale = sqlx::query_as::<_, Sale>(&format!(
            r#"
            INSERT INTO sales (order_number, store_id, status, customer_name, payment_method,
                               notes, sold_by_user_id, sale_date)
            VALUES ($1, $2, 'confirmed', $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SALE_COLUMNS
        ))
        .bind(order_number(now.date_naive(), &suffix))
        .bind(input.store_id)
        .bind(&input.customer_name)
        .bind(&input.payment_method)
        .bind(&input.notes)
        .bind(sold_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let policy = policies
                .get(&item.product_id)
                .ok_or_else(|| AppError::Internal(format!("Product {} not resolved", item.product_id)))?;
            let line = sqlx::query_as::<_, SaleLineItem>(&format!(
                r#"
                INSERT INTO sale_items (sale_id, product_id, quantity, unit_price, unit_cost)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {}
                "#,
                ITEM_COLUMNS
            ))
            .bind(sale.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(policy.selling_price)
            .bind(policy.cost_price)
            .fetch_one(&mut *tx)
            .await?;
            items.push(line);
        }

        tx.commit().await?;

        let sale = SaleWithItems::new(sale, items);
        tracing::info!(
            sale_id = sale.sale.id,
            order_number = %sale.sale.order_number,
            store_id = sale.sale.store_id,
            total = %sale.total_amount,
            units = sale.total_units,
            "Sale created"
        );
        Ok(sale)
    }

    /// Move a sale along `confirmed -> packed -> shipped`, or refund it.
    /// A refund restores the stock the sale took.
    pub async fn transition_status(&self, sale_id: i64, next: SaleStatus) -> AppResult<SaleWithItems> {
        let mut tx = self.db.begin().await?;

        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = $1 FOR UPDATE",
            SALE_COLUMNS
        ))
        .bind(sale_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Sale"))?;

        let previous = sale.status;
        let next = previous.transition(next)?;
        let items = sale_items(&mut *tx, &[sale_id]).await?;

        if next == SaleStatus::Refunded {
            restock(&mut *tx, sale.store_id, &items).await?;
        }

        let timestamp_column = match next {
            SaleStatus::Packed => "packed_at",
            SaleStatus::Shipped => "shipped_at",
            SaleStatus::Refunded => "refunded_at",
            SaleStatus::Confirmed => "updated_at",
        };
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "UPDATE sales SET status = $2, {} = NOW(), updated_at = NOW() WHERE id = $1 RETURNING {}",
            timestamp_column, SALE_COLUMNS
        ))
        .bind(sale_id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            sale_id,
            from = previous.as_str(),
            to = next.as_str(),
            "Sale status changed"
        );
        Ok(SaleWithItems::new(sale, items))
    }

    pub async fn get_sale(&self, sale_id: i64) -> AppResult<SaleWithItems> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {} FROM sales WHERE id = $1", SALE_COLUMNS))
            .bind(sale_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Sale"))?;
        let items = sale_items(&mut *self.db.acquire().await?, &[sale_id]).await?;
        Ok(SaleWithItems::new(sale, items))
    }

    /// Sales by store, status and calendar date range (UTC), newest first
    pub async fn list_sales(
        &self,
        filter: &SaleFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<SaleWithItems>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if end < start {
                return Err(AppError::field("end_date", "End date precedes start date"));
            }
        }

        let where_clause = r#"
            WHERE ($1::BIGINT IS NULL OR store_id = $1)
              AND ($2::sale_status IS NULL OR status = $2)
              AND ($3::DATE IS NULL OR (sale_date AT TIME ZONE 'UTC')::DATE >= $3)
              AND ($4::DATE IS NULL OR (sale_date AT TIME ZONE 'UTC')::DATE <= $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM sales {}", where_clause))
            .bind(filter.store_id)
            .bind(filter.status)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .fetch_one(&self.db)
            .await?;

        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales {} ORDER BY sale_date DESC, id DESC LIMIT $5 OFFSET $6",
            SALE_COLUMNS, where_clause
        ))
        .bind(filter.store_id)
        .bind(filter.status)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<i64> = sales.iter().map(|s| s.id).collect();
        let mut by_sale = BTreeMap::<i64, Vec<SaleLineItem>>::new();
        for item in sale_items(&mut *self.db.acquire().await?, &ids).await? {
            by_sale.entry(item.sale_id).or_default().push(item);
        }

        let data = sales
            .into_iter()
            .map(|sale| {
                let items = by_sale.remove(&sale.id).unwrap_or_default();
                SaleWithItems::new(sale, items)
            })
            .collect();

        Ok(PaginatedResponse::new(data, pagination, total as u64))
    }
}

async fn sale_items(conn: &mut PgConnection, sale_ids: &[i64]) -> AppResult<Vec<SaleLineItem>> {
    let items = sqlx::query_as::<_, SaleLineItem>(&format!(
        "SELECT {} FROM sale_items WHERE sale_id = ANY($1) ORDER BY sale_id, id",
        ITEM_COLUMNS
    ))
    .bind(sale_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

/// Return refunded quantities to the store, in ascending product id order
async fn restock(conn: &mut PgConnection, store_id: i64, items: &[SaleLineItem]) -> AppResult<()> {
    let mut totals = BTreeMap::<i64, i32>::new();
    for item in items {
        let entry = totals.entry(item.product_id).or_insert(0);
        *entry = entry.checked_add(item.quantity).ok_or_else(|| {
            AppError::Internal(format!("Refund quantity of product {} overflows", item.product_id))
        })?;
    }

    for (product_id, quantity) in totals {
        let policy = load_policy(&mut *conn, product_id).await?;
        if policy.track_inventory {
            adjust_locked(&mut *conn, &policy, store_id, quantity).await?;
        }
    }
    Ok(())
}
