//! Analytics service
//!
//! Every figure is recomputed from sales, line items and inventory on read;
//! nothing here writes. Revenue is `quantity * unit_price` over line items of
//! non-refunded sales, bucketed by the UTC calendar date of the sale.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    category_breakdown, profit_margin, recent_activity, sales_trend, ActivityItem, ActivityKind,
    Category, CategoryRevenue, CategorySales, DailySales, DashboardOverview, DateRange,
    FinancialSummary, Granularity, MarginReport, MarginSubject, RecentActivity, SalesTotals,
    StorePerformance, TopProduct, TrendBucket, ACTIVITY_FEED_LIMIT, LOW_STOCK_ALERT_LIMIT,
    NEW_PRODUCTS_LIMIT, RECENT_SALES_LIMIT,
};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::services::categories::{CategoryService, CATEGORY_COLUMNS};

/// Largest page the top products ranking returns
pub const MAX_TOP_PRODUCTS: i64 = 100;

/// Analytics service
#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
}

/// Category margin inputs summed over a subtree
#[derive(sqlx::FromRow)]
struct MarginTotals {
    selling_total: Decimal,
    cost_total: Option<Decimal>,
    products_considered: i64,
}

#[derive(sqlx::FromRow)]
struct SaleActivityRow {
    order_number: String,
    store_name: String,
    units: i64,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LowStockActivityRow {
    product_name: String,
    store_name: String,
    quantity: i32,
    last_updated: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ProductActivityRow {
    product_name: String,
    category_name: String,
    created_at: DateTime<Utc>,
}

impl AnalyticsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Revenue per active category, including its descendants' sales;
    /// categories without sales are reported at zero
    pub async fn category_breakdown(&self, range: DateRange) -> AppResult<Vec<CategoryRevenue>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE is_active ORDER BY sort_order, name, id",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        let tree = CategoryService::new(self.db.clone()).tree().await?;

        let direct = sqlx::query_as::<_, CategorySales>(
            r#"
            SELECT p.category_id,
                   SUM(si.quantity * si.unit_price) AS revenue,
                   SUM(si.quantity)::BIGINT AS units_sold
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.status <> 'refunded'
              AND (s.sale_date AT TIME ZONE 'UTC')::DATE BETWEEN $1 AND $2
            GROUP BY p.category_id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(category_breakdown(&categories, &tree, &direct))
    }

    /// Dense revenue/order/unit buckets across the whole range
    pub async fn sales_trend(
        &self,
        range: DateRange,
        granularity: Granularity,
    ) -> AppResult<Vec<TrendBucket>> {
        let days = self.daily_sales(range).await?;
        Ok(sales_trend(range, granularity, &days))
    }

    async fn daily_sales(&self, range: DateRange) -> AppResult<Vec<DailySales>> {
        let days = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT (s.sale_date AT TIME ZONE 'UTC')::DATE AS day,
                   SUM(si.quantity * si.unit_price) AS revenue,
                   COUNT(DISTINCT s.id) AS order_count,
                   SUM(si.quantity)::BIGINT AS units_sold
            FROM sales s
            JOIN sale_items si ON si.sale_id = s.id
            WHERE s.status <> 'refunded'
              AND (s.sale_date AT TIME ZONE 'UTC')::DATE BETWEEN $1 AND $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(days)
    }

    /// Margin of one product at its current prices
    pub async fn product_margin(&self, product_id: i64) -> AppResult<MarginReport> {
        let (name, selling_price, cost_price) = sqlx::query_as::<_, (String, Decimal, Option<Decimal>)>(
            "SELECT name, selling_price, cost_price FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

        Ok(MarginReport {
            subject: MarginSubject::Product,
            id: product_id,
            name,
            selling_price,
            cost_price,
            profit_margin: profit_margin(selling_price, cost_price),
            products_considered: 1,
        })
    }

    /// Margin of a category subtree: summed selling and cost prices of its
    /// active products that have a cost price
    pub async fn category_margin(&self, category_id: i64) -> AppResult<MarginReport> {
        let categories = CategoryService::new(self.db.clone());
        let category = categories.find(category_id).await?;
        let subtree = categories.tree().await?.subtree(category_id);

        let totals = sqlx::query_as::<_, MarginTotals>(
            r#"
            SELECT COALESCE(SUM(selling_price), 0) AS selling_total,
                   SUM(cost_price) AS cost_total,
                   COUNT(*) AS products_considered
            FROM products
            WHERE category_id = ANY($1)
              AND status = 'active'
              AND cost_price IS NOT NULL
            "#,
        )
        .bind(&subtree)
        .fetch_one(&self.db)
        .await?;

        Ok(MarginReport {
            subject: MarginSubject::Category,
            id: category_id,
            name: category.name,
            selling_price: totals.selling_total,
            cost_price: totals.cost_total,
            profit_margin: profit_margin(totals.selling_total, totals.cost_total),
            products_considered: totals.products_considered,
        })
    }

    /// Per active store: revenue, orders and units (all time when no range
    /// is given), products carried and low-stock records
    pub async fn store_performance(&self, range: Option<DateRange>) -> AppResult<Vec<StorePerformance>> {
        let rows = sqlx::query_as::<_, StorePerformance>(
            r#"
            SELECT st.id AS store_id, st.name AS store_name, st.code AS store_code,
                   COALESCE(t.revenue, 0) AS revenue,
                   COALESCE(t.order_count, 0) AS order_count,
                   COALESCE(t.units_sold, 0) AS units_sold,
                   (SELECT COUNT(*) FROM inventory i
                     WHERE i.store_id = st.id AND i.quantity > 0) AS unique_products,
                   (SELECT COUNT(*) FROM inventory i
                      JOIN products p ON p.id = i.product_id
                     WHERE i.store_id = st.id AND p.status = 'active' AND p.track_inventory
                       AND i.quantity <= i.min_stock) AS low_stock_count
            FROM stores st
            LEFT JOIN LATERAL (
                SELECT SUM(si.quantity * si.unit_price) AS revenue,
                       COUNT(DISTINCT s.id) AS order_count,
                       SUM(si.quantity)::BIGINT AS units_sold
                FROM sales s
                JOIN sale_items si ON si.sale_id = s.id
                WHERE s.store_id = st.id
                  AND s.status <> 'refunded'
                  AND ($1::DATE IS NULL OR (s.sale_date AT TIME ZONE 'UTC')::DATE >= $1)
                  AND ($2::DATE IS NULL OR (s.sale_date AT TIME ZONE 'UTC')::DATE <= $2)
            ) t ON TRUE
            WHERE st.is_active
            ORDER BY revenue DESC, st.id
            "#,
        )
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Revenue, cost and profit for a range, compared with the range of
    /// equal length just before it
    pub async fn financial_summary(&self, range: DateRange) -> AppResult<FinancialSummary> {
        let current = self.totals(range).await?;
        let previous_revenue = match range.previous() {
            Some(previous) => self.totals(previous).await?.revenue,
            None => Decimal::ZERO,
        };
        Ok(FinancialSummary::from_totals(range, &current, previous_revenue))
    }

    async fn totals(&self, range: DateRange) -> AppResult<SalesTotals> {
        let totals = sqlx::query_as::<_, SalesTotals>(
            r#"
            SELECT COALESCE(SUM(si.quantity * si.unit_price), 0) AS revenue,
                   COALESCE(SUM(si.quantity * si.unit_cost), 0) AS cost,
                   COUNT(DISTINCT s.id) AS orders,
                   COALESCE(SUM(si.quantity), 0)::BIGINT AS units
            FROM sales s
            JOIN sale_items si ON si.sale_id = s.id
            WHERE s.status <> 'refunded'
              AND (s.sale_date AT TIME ZONE 'UTC')::DATE BETWEEN $1 AND $2
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.db)
        .await?;
        Ok(totals)
    }

    /// Best sellers by revenue in a range
    pub async fn top_products(&self, range: DateRange, limit: i64) -> AppResult<Vec<TopProduct>> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT p.id AS product_id, p.code, p.name,
                   SUM(si.quantity * si.unit_price) AS revenue,
                   SUM(si.quantity)::BIGINT AS units_sold,
                   COUNT(DISTINCT s.id) AS order_count
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.status <> 'refunded'
              AND (s.sale_date AT TIME ZONE 'UTC')::DATE BETWEEN $1 AND $2
            GROUP BY p.id, p.code, p.name
            ORDER BY revenue DESC, p.id
            LIMIT $3
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(limit.clamp(1, MAX_TOP_PRODUCTS))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Headline counts for the dashboard
    pub async fn dashboard_overview(&self) -> AppResult<DashboardOverview> {
        let overview = sqlx::query_as::<_, DashboardOverview>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products WHERE status = 'active') AS active_products,
                (SELECT COUNT(*) FROM categories WHERE is_active) AS active_categories,
                (SELECT COUNT(*) FROM stores WHERE is_active) AS active_stores,
                (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM inventory i
                   JOIN products p ON p.id = i.product_id
                  WHERE p.status = 'active' AND p.track_inventory
                    AND i.quantity > 0 AND i.quantity <= i.min_stock) AS low_stock_records,
                (SELECT COUNT(*) FROM inventory i
                   JOIN products p ON p.id = i.product_id
                  WHERE p.status = 'active' AND p.track_inventory
                    AND i.quantity <= 0) AS out_of_stock_records,
                COALESCE((SELECT SUM(si.quantity * si.unit_price) FROM sale_items si
                            JOIN sales s ON s.id = si.sale_id
                           WHERE s.status <> 'refunded'
                             AND (s.sale_date AT TIME ZONE 'UTC')::DATE = (NOW() AT TIME ZONE 'UTC')::DATE), 0)
                    AS revenue_today,
                (SELECT COUNT(*) FROM sales s
                  WHERE s.status <> 'refunded'
                    AND (s.sale_date AT TIME ZONE 'UTC')::DATE = (NOW() AT TIME ZONE 'UTC')::DATE)
                    AS orders_today
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(overview)
    }

    /// Latest sales, worst low-stock records and newest products merged
    /// into one feed
    pub async fn recent_activity(&self) -> AppResult<RecentActivity> {
        let sales = sqlx::query_as::<_, SaleActivityRow>(
            r#"
            SELECT s.order_number, st.name AS store_name,
                   COALESCE(SUM(si.quantity), 0)::BIGINT AS units,
                   COALESCE(SUM(si.quantity * si.unit_price), 0) AS total_amount,
                   s.created_at
            FROM sales s
            JOIN stores st ON st.id = s.store_id
            LEFT JOIN sale_items si ON si.sale_id = s.id
            GROUP BY s.id, st.name
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_SALES_LIMIT)
        .fetch_all(&self.db)
        .await?;

        let alerts = sqlx::query_as::<_, LowStockActivityRow>(
            r#"
            SELECT p.name AS product_name, st.name AS store_name, i.quantity, i.last_updated
            FROM inventory i
            JOIN products p ON p.id = i.product_id
            JOIN stores st ON st.id = i.store_id
            WHERE p.status = 'active' AND p.track_inventory
              AND i.quantity <= i.min_stock
            ORDER BY i.quantity ASC, i.last_updated DESC, i.id
            LIMIT $1
            "#,
        )
        .bind(LOW_STOCK_ALERT_LIMIT)
        .fetch_all(&self.db)
        .await?;

        let products = sqlx::query_as::<_, ProductActivityRow>(
            r#"
            SELECT p.name AS product_name, c.name AS category_name, p.created_at
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.status = 'active'
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $1
            "#,
        )
        .bind(NEW_PRODUCTS_LIMIT)
        .fetch_all(&self.db)
        .await?;

        let sales = sales
            .into_iter()
            .map(|row| ActivityItem {
                kind: ActivityKind::Sale,
                title: format!("Sale #{}", row.order_number),
                description: format!("{} units - {}", row.units, row.total_amount.round_dp(2)),
                store: Some(row.store_name),
                timestamp: row.created_at,
            })
            .collect();
        let alerts = alerts
            .into_iter()
            .map(|row| ActivityItem {
                kind: ActivityKind::LowStock,
                title: "Low Stock Alert".to_string(),
                description: format!(
                    "{} - Only {} left in {}",
                    row.product_name, row.quantity, row.store_name
                ),
                store: Some(row.store_name),
                timestamp: row.last_updated,
            })
            .collect();
        let products = products
            .into_iter()
            .map(|row| ActivityItem {
                kind: ActivityKind::NewProduct,
                title: "New Product Added".to_string(),
                description: format!("{} - {}", row.product_name, row.category_name),
                store: None,
                timestamp: row.created_at,
            })
            .collect();

        Ok(recent_activity(sales, alerts, products, ACTIVITY_FEED_LIMIT))
    }
}
