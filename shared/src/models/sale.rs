//! Sales models and the fulfilment state machine

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::validation::FieldError;

/// Sale status.
///
/// Forward chain `Confirmed -> Packed -> Shipped`; `Refunded` is a terminal
/// branch reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "sale_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Confirmed,
    Packed,
    Shipped,
    Refunded,
}

/// Illegal status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move sale from {from} to {to}")]
pub struct TransitionError {
    pub from: SaleStatus,
    pub to: SaleStatus,
}

impl SaleStatus {
    pub const ALL: [SaleStatus; 4] = [
        SaleStatus::Confirmed,
        SaleStatus::Packed,
        SaleStatus::Shipped,
        SaleStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Confirmed => "confirmed",
            SaleStatus::Packed => "packed",
            SaleStatus::Shipped => "shipped",
            SaleStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(SaleStatus::Confirmed),
            "packed" => Some(SaleStatus::Packed),
            "shipped" => Some(SaleStatus::Shipped),
            "refunded" => Some(SaleStatus::Refunded),
            _ => None,
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Shipped | SaleStatus::Refunded)
    }

    /// Statuses reachable in one step
    pub fn next_statuses(&self) -> &'static [SaleStatus] {
        match self {
            SaleStatus::Confirmed => &[SaleStatus::Packed, SaleStatus::Refunded],
            SaleStatus::Packed => &[SaleStatus::Shipped, SaleStatus::Refunded],
            SaleStatus::Shipped | SaleStatus::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: SaleStatus) -> bool {
        self.next_statuses().contains(&next)
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: SaleStatus) -> Result<SaleStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }

    /// Whether revenue from a sale in this status counts in analytics
    pub fn counts_as_revenue(&self) -> bool {
        !matches!(self, SaleStatus::Refunded)
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sale header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,
    pub order_number: String,
    pub store_id: i64,
    pub status: SaleStatus,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub sold_by_user_id: Option<i64>,
    pub sale_date: DateTime<Utc>,
    pub packed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable sale line: price and cost are snapshots taken at sale time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLineItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_cost: Option<Decimal>,
}

impl SaleLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sale with its line items and totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWithItems {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleLineItem>,
    pub total_amount: Decimal,
    pub total_units: i64,
}

impl SaleWithItems {
    pub fn new(sale: Sale, items: Vec<SaleLineItem>) -> Self {
        let total_amount = items.iter().map(SaleLineItem::line_total).sum();
        let total_units = items.iter().map(|i| i64::from(i.quantity)).sum();
        Self {
            sale,
            items,
            total_amount,
            total_units,
        }
    }
}

/// Requested line of a new sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemInput {
    pub product_id: i64,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Input for creating a sale
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSaleInput {
    pub store_id: i64,
    #[validate(length(min = 1, message = "A sale needs at least one line item"))]
    pub items: Vec<LineItemInput>,
    #[validate(length(max = 100))]
    pub customer_name: Option<String>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl CreateSaleInput {
    /// Validate header and every line, reporting lines as `items[i].field`
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let mut extra = Vec::new();
        for (idx, item) in self.items.iter().enumerate() {
            if let Err(errs) = crate::validation::collect(item, Vec::new()) {
                extra.extend(errs.into_iter().map(|e| {
                    FieldError::new(format!("items[{}].{}", idx, e.field), e.message)
                }));
            }
        }
        if let Err(err) = self.quantities_by_product() {
            extra.push(err);
        }
        crate::validation::collect(self, extra)
    }

    /// Net quantity per product, ordered by product id.
    ///
    /// Rows are locked in this order so concurrent multi-line sales acquire
    /// inventory locks consistently. Fails when one product's lines add up
    /// past `i32::MAX`.
    pub fn quantities_by_product(&self) -> Result<Vec<(i64, i32)>, FieldError> {
        let mut totals = std::collections::BTreeMap::<i64, i32>::new();
        for item in &self.items {
            let entry = totals.entry(item.product_id).or_insert(0);
            *entry = entry.checked_add(item.quantity).ok_or_else(|| {
                FieldError::new(
                    "items",
                    format!("Total quantity of product {} is too large", item.product_id),
                )
            })?;
        }
        Ok(totals.into_iter().collect())
    }
}

/// Input for a status change
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionInput {
    pub status: SaleStatus,
}

/// Sale query filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub store_id: Option<i64>,
    pub status: Option<SaleStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Generate an order number like `SO-20240314-1A2B3C4D`
pub fn order_number(date: NaiveDate, suffix: &str) -> String {
    let suffix: String = suffix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("SO-{}-{}", date.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_forward_chain() {
        let packed = SaleStatus::Confirmed.transition(SaleStatus::Packed).unwrap();
        let shipped = packed.transition(SaleStatus::Shipped).unwrap();
        assert_eq!(shipped, SaleStatus::Shipped);
    }

    #[test]
    fn test_backward_rejected() {
        let err = SaleStatus::Shipped
            .transition(SaleStatus::Confirmed)
            .unwrap_err();
        assert_eq!(err.from, SaleStatus::Shipped);
        assert_eq!(err.to, SaleStatus::Confirmed);
    }

    #[test]
    fn test_skip_rejected() {
        assert!(SaleStatus::Confirmed.transition(SaleStatus::Shipped).is_err());
    }

    #[test]
    fn test_refund_from_open_statuses() {
        assert!(SaleStatus::Confirmed.can_transition_to(SaleStatus::Refunded));
        assert!(SaleStatus::Packed.can_transition_to(SaleStatus::Refunded));
        assert!(!SaleStatus::Shipped.can_transition_to(SaleStatus::Refunded));
    }

    #[test]
    fn test_refunded_is_terminal() {
        for next in SaleStatus::ALL {
            assert!(SaleStatus::Refunded.transition(next).is_err());
        }
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in SaleStatus::ALL {
            assert_eq!(SaleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SaleStatus::parse("delivered"), None);
    }

    #[test]
    fn test_line_totals() {
        let sale = Sale {
            id: 1,
            order_number: "SO-1".into(),
            store_id: 1,
            status: SaleStatus::Confirmed,
            customer_name: None,
            payment_method: None,
            notes: None,
            sold_by_user_id: None,
            sale_date: Utc::now(),
            packed_at: None,
            shipped_at: None,
            refunded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = vec![
            SaleLineItem { id: 1, sale_id: 1, product_id: 1, quantity: 2, unit_price: Decimal::new(1050, 2), unit_cost: None },
            SaleLineItem { id: 2, sale_id: 1, product_id: 2, quantity: 1, unit_price: Decimal::from(200), unit_cost: None },
        ];
        let full = SaleWithItems::new(sale, items);
        assert_eq!(full.total_amount, Decimal::new(22100, 2));
        assert_eq!(full.total_units, 3);
    }

    #[test]
    fn test_quantities_merged_and_sorted() {
        let input = CreateSaleInput {
            store_id: 1,
            items: vec![
                LineItemInput { product_id: 9, quantity: 1 },
                LineItemInput { product_id: 2, quantity: 3 },
                LineItemInput { product_id: 9, quantity: 4 },
            ],
            customer_name: None,
            payment_method: None,
            notes: None,
        };
        assert_eq!(input.quantities_by_product().unwrap(), vec![(2, 3), (9, 5)]);
    }

    #[test]
    fn test_merged_quantity_past_i32_is_rejected() {
        let input = CreateSaleInput {
            store_id: 1,
            items: vec![
                LineItemInput { product_id: 4, quantity: 2_000_000_000 },
                LineItemInput { product_id: 4, quantity: 2_000_000_000 },
            ],
            customer_name: None,
            payment_method: None,
            notes: None,
        };
        assert_eq!(input.quantities_by_product().unwrap_err().field, "items");
        let errors = input.check().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "items"));
    }

    #[test]
    fn test_line_item_serializes_with_request_field_names() {
        let line = LineItemInput { product_id: 7, quantity: 3 };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json, serde_json::json!({"product_id": 7, "quantity": 3}));
    }

    #[test]
    fn test_check_reports_every_bad_line() {
        let input = CreateSaleInput {
            store_id: 1,
            items: vec![
                LineItemInput { product_id: 1, quantity: 0 },
                LineItemInput { product_id: 2, quantity: 1 },
                LineItemInput { product_id: 3, quantity: -2 },
            ],
            customer_name: None,
            payment_method: None,
            notes: None,
        };
        let errors = input.check().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["items[0].quantity", "items[2].quantity"]);
    }

    #[test]
    fn test_empty_sale_rejected() {
        let input = CreateSaleInput {
            store_id: 1,
            items: vec![],
            customer_name: None,
            payment_method: None,
            notes: None,
        };
        let errors = input.check().unwrap_err();
        assert_eq!(errors[0].field, "items");
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        assert_eq!(order_number(date, "1a2b3c4d-5e6f"), "SO-20240314-1A2B3C4D");
    }

    fn status_strategy() -> impl Strategy<Value = SaleStatus> {
        prop::sample::select(SaleStatus::ALL.to_vec())
    }

    proptest! {
        /// Terminal statuses accept nothing; the only way into Refunded is from an open status
        #[test]
        fn test_transition_table(from in status_strategy(), to in status_strategy()) {
            let ok = from.transition(to).is_ok();
            if from.is_terminal() {
                prop_assert!(!ok);
            }
            if from == to {
                prop_assert!(!ok);
            }
            if to == SaleStatus::Refunded {
                prop_assert_eq!(ok, !from.is_terminal());
            }
            if ok && to != SaleStatus::Refunded {
                // forward moves advance exactly one step
                let pos = |s: SaleStatus| [SaleStatus::Confirmed, SaleStatus::Packed, SaleStatus::Shipped]
                    .iter()
                    .position(|x| *x == s);
                prop_assert_eq!(pos(to), pos(from).map(|p| p + 1));
            }
        }
    }
}
