//! Analytics models and the pure aggregation rules behind them
//!
//! The database hands back sparse per-day and per-category sums; the
//! functions here turn them into the dense, zero-filled shapes that the
//! dashboards chart directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::{Category, CategoryTree};
use crate::types::DateRange;

/// Width of a trend bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    /// First day of the bucket containing `date` (weeks start on Monday)
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => date
                .checked_sub_signed(Duration::days(i64::from(date.weekday().num_days_from_monday())))
                .unwrap_or(date),
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// First day of the bucket after the one starting at `start`; `None`
    /// past the end of the calendar
    fn next_bucket(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_signed(Duration::days(1)),
            Granularity::Week => start.checked_add_signed(Duration::days(7)),
            Granularity::Month => {
                let (y, m) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1)
            }
        }
    }
}

/// Sales totals for one calendar day, as returned by the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DailySales {
    pub day: NaiveDate,
    pub revenue: Decimal,
    pub order_count: i64,
    pub units_sold: i64,
}

/// One point of a sales trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub revenue: Decimal,
    pub order_count: i64,
    pub units_sold: i64,
}

/// Dense trend over `range`: one bucket per period, empty periods zeroed.
///
/// Bucket bounds are clipped to the range, so the first and last buckets of
/// a weekly or monthly series may be partial.
pub fn sales_trend(range: DateRange, granularity: Granularity, days: &[DailySales]) -> Vec<TrendBucket> {
    let mut buckets = Vec::new();
    let mut start = granularity.bucket_start(range.start);
    while start <= range.end {
        let next = granularity.next_bucket(start);
        let period_end = next
            .and_then(|n| n.checked_sub_signed(Duration::days(1)))
            .map_or(range.end, |last| last.min(range.end));
        buckets.push(TrendBucket {
            period_start: start.max(range.start),
            period_end,
            revenue: Decimal::ZERO,
            order_count: 0,
            units_sold: 0,
        });
        match next {
            Some(next) => start = next,
            None => break,
        }
    }

    for day in days.iter().filter(|d| range.contains(d.day)) {
        let idx = buckets.partition_point(|b| b.period_end < day.day);
        if let Some(bucket) = buckets.get_mut(idx) {
            bucket.revenue += day.revenue;
            bucket.order_count += day.order_count;
            bucket.units_sold += day.units_sold;
        }
    }
    buckets
}

/// Sales totals attributed directly to one category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CategorySales {
    pub category_id: i64,
    pub revenue: Decimal,
    pub units_sold: i64,
}

/// Revenue of a category including all of its descendants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRevenue {
    pub category_id: i64,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub revenue: Decimal,
    pub units_sold: i64,
    /// Share of the revenue of all requested root categories, in percent
    pub share_percent: Decimal,
}

/// Roll direct category sales up the tree.
///
/// Every requested category gets an entry, zero-filled when nothing sold.
pub fn category_breakdown(
    requested: &[Category],
    tree: &CategoryTree,
    direct: &[CategorySales],
) -> Vec<CategoryRevenue> {
    let by_category: BTreeMap<i64, &CategorySales> =
        direct.iter().map(|s| (s.category_id, s)).collect();

    let mut entries: Vec<CategoryRevenue> = requested
        .iter()
        .map(|category| {
            let (revenue, units_sold) = tree
                .subtree(category.id)
                .iter()
                .filter_map(|id| by_category.get(id))
                .fold((Decimal::ZERO, 0i64), |(r, u), s| (r + s.revenue, u + s.units_sold));
            CategoryRevenue {
                category_id: category.id,
                name: category.name.clone(),
                icon: category.icon.clone(),
                color: category.color.clone(),
                revenue,
                units_sold,
                share_percent: Decimal::ZERO,
            }
        })
        .collect();

    // only count categories whose ancestors are not also listed
    let listed: Vec<i64> = requested.iter().map(|c| c.id).collect();
    let total: Decimal = entries
        .iter()
        .filter(|e| !tree.ancestors(e.category_id).iter().any(|a| listed.contains(a)))
        .map(|e| e.revenue)
        .sum();
    if !total.is_zero() {
        for entry in &mut entries {
            entry.share_percent = (entry.revenue / total * Decimal::from(100)).round_dp(2);
        }
    }
    entries
}

/// Margin report for one product or a whole category subtree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginReport {
    pub subject: MarginSubject,
    pub id: i64,
    pub name: String,
    pub selling_price: Decimal,
    pub cost_price: Option<Decimal>,
    /// `None` when undefined: zero selling price or unknown cost
    pub profit_margin: Option<Decimal>,
    pub products_considered: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginSubject {
    Product,
    Category,
}

/// Per-store performance row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StorePerformance {
    pub store_id: i64,
    pub store_name: String,
    pub store_code: String,
    pub revenue: Decimal,
    pub order_count: i64,
    pub units_sold: i64,
    pub unique_products: i64,
    pub low_stock_count: i64,
}

/// Finance summary over a date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub range: DateRange,
    pub total_revenue: Decimal,
    /// Cost of line items whose cost was known at sale time
    pub total_cost: Decimal,
    pub gross_profit: Decimal,
    pub profit_margin: Option<Decimal>,
    pub total_orders: i64,
    pub total_units_sold: i64,
    pub average_order_value: Decimal,
    pub previous_period_revenue: Decimal,
    pub revenue_change_percent: Option<Decimal>,
}

/// Raw totals feeding [`FinancialSummary`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesTotals {
    pub revenue: Decimal,
    pub cost: Decimal,
    pub orders: i64,
    pub units: i64,
}

impl FinancialSummary {
    pub fn from_totals(range: DateRange, current: &SalesTotals, previous_revenue: Decimal) -> Self {
        let gross_profit = current.revenue - current.cost;
        let profit_margin = (!current.revenue.is_zero())
            .then(|| (gross_profit / current.revenue).round_dp(4));
        let average_order_value = if current.orders > 0 {
            (current.revenue / Decimal::from(current.orders)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let revenue_change_percent = (!previous_revenue.is_zero()).then(|| {
            ((current.revenue - previous_revenue) / previous_revenue * Decimal::from(100)).round_dp(2)
        });
        Self {
            range,
            total_revenue: current.revenue,
            total_cost: current.cost,
            gross_profit,
            profit_margin,
            total_orders: current.orders,
            total_units_sold: current.units,
            average_order_value,
            previous_period_revenue: previous_revenue,
            revenue_change_percent,
        }
    }
}

/// Best-selling product row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TopProduct {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub revenue: Decimal,
    pub units_sold: i64,
    pub order_count: i64,
}

/// Dashboard headline numbers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DashboardOverview {
    pub active_products: i64,
    pub active_categories: i64,
    pub active_stores: i64,
    pub active_users: i64,
    pub low_stock_records: i64,
    pub out_of_stock_records: i64,
    pub revenue_today: Decimal,
    pub orders_today: i64,
}

/// Sales shown in the activity feed
pub const RECENT_SALES_LIMIT: i64 = 10;
/// Low-stock alerts shown in the activity feed
pub const LOW_STOCK_ALERT_LIMIT: i64 = 5;
/// Newly added products shown in the activity feed
pub const NEW_PRODUCTS_LIMIT: i64 = 5;
/// Entries kept after merging the feeds
pub const ACTIVITY_FEED_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Sale,
    LowStock,
    NewProduct,
}

/// One entry of the dashboard activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    /// Store the event happened in; `None` for catalog events
    pub store: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// How many entries each source contributed before the merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub recent_sales: usize,
    pub low_stock_alerts: usize,
    pub new_products: usize,
}

/// Dashboard activity feed, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentActivity {
    pub activities: Vec<ActivityItem>,
    pub summary: ActivityCounts,
}

/// Merge the three activity sources newest first and keep the first `limit`.
/// Entries with equal timestamps keep source order: sales, alerts, products.
pub fn recent_activity(
    sales: Vec<ActivityItem>,
    alerts: Vec<ActivityItem>,
    products: Vec<ActivityItem>,
    limit: usize,
) -> RecentActivity {
    let summary = ActivityCounts {
        recent_sales: sales.len(),
        low_stock_alerts: alerts.len(),
        new_products: products.len(),
    };
    let mut activities: Vec<ActivityItem> = sales.into_iter().chain(alerts).chain(products).collect();
    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    activities.truncate(limit);
    RecentActivity { activities, summary }
}
