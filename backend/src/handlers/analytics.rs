//! Analytics, finance and dashboard handlers
//!
//! Date ranges are inclusive UTC calendar dates and default to the 30 days
//! ending today.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;
use shared::{
    CategoryRevenue, DashboardOverview, DateRange, FieldError, FinancialSummary, Granularity, MarginReport,
    Permission, RecentActivity, StorePerformance, TopProduct, TrendBucket,
};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::AnalyticsService;
use crate::AppState;

/// Default window when no start date is given
pub const DEFAULT_RANGE_DAYS: i64 = 30;

/// Longest range a single query may cover
pub const MAX_RANGE_DAYS: i64 = 3660;

/// Calendar years accepted in query dates
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RangeQuery {
    /// Resolve against `today`; an open end means today, an open start
    /// means the default window before the end
    pub fn resolve(&self, today: NaiveDate) -> AppResult<DateRange> {
        let mut errors = Vec::new();
        for (field, date) in [("start_date", self.start_date), ("end_date", self.end_date)] {
            if date.is_some_and(|d| !(MIN_YEAR..=MAX_YEAR).contains(&d.year())) {
                errors.push(FieldError::new(
                    field,
                    format!("Year must be between {} and {}", MIN_YEAR, MAX_YEAR),
                ));
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let end = self.end_date.unwrap_or(today);
        let start = match self.start_date {
            Some(start) => start,
            None => end
                .checked_sub_signed(Duration::days(DEFAULT_RANGE_DAYS - 1))
                .ok_or_else(|| AppError::field("end_date", "End date is out of range"))?,
        };
        let range = DateRange::new(start, end)
            .ok_or_else(|| AppError::field("end_date", "End date precedes start date"))?;
        if range.num_days() > MAX_RANGE_DAYS {
            return Err(AppError::field(
                "start_date",
                format!("Range may cover at most {} days", MAX_RANGE_DAYS),
            ));
        }
        Ok(range)
    }

    fn resolve_today(&self) -> AppResult<DateRange> {
        self.resolve(Utc::now().date_naive())
    }

    fn is_open(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    #[serde(default)]
    pub granularity: Granularity,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<i64>,
}

/// Revenue per category including descendants, zero-filled
pub async fn category_breakdown(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<CategoryRevenue>>> {
    current_user.require(Permission::View)?;
    let range = query.resolve_today()?;
    let breakdown = AnalyticsService::new(state.db).category_breakdown(range).await?;
    Ok(Json(breakdown))
}

/// Dense trend buckets
pub async fn sales_trend(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<RangeQuery>,
    Query(options): Query<TrendQuery>,
) -> AppResult<Json<Vec<TrendBucket>>> {
    current_user.require(Permission::View)?;
    let range = query.resolve_today()?;
    let trend = AnalyticsService::new(state.db)
        .sales_trend(range, options.granularity)
        .await?;
    Ok(Json(trend))
}

pub async fn product_margin(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<MarginReport>> {
    current_user.require(Permission::View)?;
    let report = AnalyticsService::new(state.db).product_margin(product_id).await?;
    Ok(Json(report))
}

pub async fn category_margin(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<i64>,
) -> AppResult<Json<MarginReport>> {
    current_user.require(Permission::View)?;
    let report = AnalyticsService::new(state.db).category_margin(category_id).await?;
    Ok(Json(report))
}

/// Per-store figures; all time unless a range is given
pub async fn store_performance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<Vec<StorePerformance>>> {
    current_user.require(Permission::View)?;
    let range = if query.is_open() {
        None
    } else {
        Some(query.resolve_today()?)
    };
    let rows = AnalyticsService::new(state.db).store_performance(range).await?;
    Ok(Json(rows))
}

pub async fn financial_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<FinancialSummary>> {
    current_user.require(Permission::View)?;
    let range = query.resolve_today()?;
    let summary = AnalyticsService::new(state.db).financial_summary(range).await?;
    Ok(Json(summary))
}

pub async fn top_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<RangeQuery>,
    Query(options): Query<TopProductsQuery>,
) -> AppResult<Json<Vec<TopProduct>>> {
    current_user.require(Permission::View)?;
    let range = query.resolve_today()?;
    let rows = AnalyticsService::new(state.db)
        .top_products(range, options.limit.unwrap_or(10))
        .await?;
    Ok(Json(rows))
}

pub async fn dashboard_overview(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardOverview>> {
    current_user.require(Permission::View)?;
    let overview = AnalyticsService::new(state.db).dashboard_overview().await?;
    Ok(Json(overview))
}

pub async fn dashboard_recent_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<RecentActivity>> {
    current_user.require(Permission::View)?;
    let feed = AnalyticsService::new(state.db).recent_activity().await?;
    Ok(Json(feed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_open_range_defaults_to_thirty_days() {
        let range = RangeQuery::default().resolve(date(2024, 3, 31)).unwrap();
        assert_eq!(range.start, date(2024, 3, 2));
        assert_eq!(range.end, date(2024, 3, 31));
        assert_eq!(range.num_days(), DEFAULT_RANGE_DAYS);
    }

    #[test]
    fn test_inverted_range_is_a_validation_error() {
        let query = RangeQuery {
            start_date: Some(date(2024, 3, 10)),
            end_date: Some(date(2024, 3, 1)),
        };
        let err = query.resolve(date(2024, 3, 31)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_single_day_range() {
        let query = RangeQuery {
            start_date: Some(date(2024, 3, 10)),
            end_date: Some(date(2024, 3, 10)),
        };
        assert_eq!(query.resolve(date(2024, 3, 31)).unwrap().num_days(), 1);
    }

    #[test]
    fn test_overlong_range_rejected() {
        let query = RangeQuery {
            start_date: Some(date(2000, 1, 1)),
            end_date: Some(date(2024, 1, 1)),
        };
        assert!(query.resolve(date(2024, 3, 31)).is_err());
    }

    #[test]
    fn test_dates_outside_four_digit_years_rejected() {
        let query = RangeQuery {
            start_date: None,
            end_date: Some(NaiveDate::MIN),
        };
        let err = query.resolve(date(2024, 3, 31)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let query = RangeQuery {
            start_date: Some(date(9999, 12, 1)),
            end_date: Some(date(10000, 1, 1)),
        };
        match query.resolve(date(2024, 3, 31)).unwrap_err() {
            AppError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "end_date");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_default_start_at_year_one() {
        let query = RangeQuery {
            start_date: None,
            end_date: Some(date(1, 1, 10)),
        };
        let range = query.resolve(date(2024, 3, 31)).unwrap();
        assert_eq!(range.end, date(1, 1, 10));
        assert_eq!(range.num_days(), DEFAULT_RANGE_DAYS);
    }
}
