//! Common types used across the platform

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Upper bound on page size accepted from clients
pub const MAX_PER_PAGE: u32 = 200;

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    /// Page size clamped to `1..=MAX_PER_PAGE`
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, MAX_PER_PAGE))
    }

    /// Row offset for the (1-based) page
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }

    /// Build the response metadata for a total row count
    pub fn meta(&self, total_items: u64) -> PaginationMeta {
        let per_page = self.limit() as u64;
        let total_pages = total_items.div_ceil(per_page) as u32;
        PaginationMeta {
            page: self.page.max(1),
            per_page: per_page as u32,
            total_items,
            total_pages,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: u64) -> Self {
        Self {
            data,
            pagination: pagination.meta(total_items),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Inclusive date range for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, returning `None` when `end` precedes `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of calendar days covered, both ends included
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The range of equal length immediately before this one; `None` when it
    /// would fall off the start of the calendar
    pub fn previous(&self) -> Option<Self> {
        let len = self.num_days();
        let end = self.start.checked_sub_signed(Duration::days(1))?;
        let start = end.checked_sub_signed(Duration::days(len - 1))?;
        Some(Self { start, end })
    }

    /// Iterate every day in the range
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Distinguishes an absent field from an explicit `null`: use with
/// `#[serde(default, deserialize_with = "...")]` on an `Option<Option<T>>`
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_pagination_offsets() {
        let p = Pagination { page: 3, per_page: 25 };
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);

        let zero = Pagination { page: 0, per_page: 0 };
        assert_eq!(zero.limit(), 1);
        assert_eq!(zero.offset(), 0);
    }

    #[test]
    fn test_pagination_meta_rounds_up() {
        let p = Pagination { page: 1, per_page: 20 };
        let meta = p.meta(41);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(p.meta(0).total_pages, 0);
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(date(2024, 5, 2), date(2024, 5, 1)).is_none());
        assert!(DateRange::new(date(2024, 5, 1), date(2024, 5, 1)).is_some());
    }

    #[test]
    fn test_date_range_days_inclusive() {
        let range = DateRange::new(date(2024, 2, 27), date(2024, 3, 2)).unwrap();
        assert_eq!(range.num_days(), 5);
        assert_eq!(range.days().count(), 5);
        assert!(range.contains(date(2024, 2, 29)));
    }

    #[test]
    fn test_previous_period() {
        let range = DateRange::new(date(2024, 3, 8), date(2024, 3, 14)).unwrap();
        let prev = range.previous().unwrap();
        assert_eq!(prev.start, date(2024, 3, 1));
        assert_eq!(prev.end, date(2024, 3, 7));
    }

    #[test]
    fn test_previous_period_at_calendar_start() {
        let range = DateRange::new(NaiveDate::MIN, date(2024, 1, 1)).unwrap();
        assert!(range.previous().is_none());
    }
}
