//! Inventory ledger models
//!
//! One record per (product, store). Health indicators are never stored:
//! they are derived from `quantity` and `min_stock` on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Health of a single inventory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    /// Classify a quantity against its minimum threshold.
    ///
    /// `OutOfStock` iff `quantity <= 0`, `LowStock` iff
    /// `0 < quantity <= min_stock`, `InStock` otherwise.
    pub fn classify(quantity: i32, min_stock: i32) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity <= min_stock {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::InStock => "in_stock",
        }
    }
}

/// Stock adjustment rejected by the ledger rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: i32, requested: i32 },

    #[error("stock quantity overflow")]
    Overflow,
}

/// Apply `delta` to `current`.
///
/// Without backorder the result may not drop below zero. Positive deltas
/// always succeed (barring overflow), even from a negative backorder balance.
pub fn apply_delta(current: i32, delta: i32, allow_backorder: bool) -> Result<i32, StockError> {
    let next = current.checked_add(delta).ok_or(StockError::Overflow)?;
    if next < 0 && delta < 0 && !allow_backorder {
        return Err(StockError::Insufficient {
            available: current.max(0),
            requested: delta.saturating_neg(),
        });
    }
    Ok(next)
}

/// A stored inventory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryRecord {
    pub product_id: i64,
    pub store_id: i64,
    pub quantity: i32,
    pub min_stock: i32,
    pub max_stock: Option<i32>,
    /// `None` for a synthetic record of a product never stocked at the store
    pub last_updated: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// Zero-quantity record for a product not yet stocked at a store
    pub fn synthetic(product_id: i64, store_id: i64, min_stock: i32, max_stock: Option<i32>) -> Self {
        Self {
            product_id,
            store_id,
            quantity: 0,
            min_stock,
            max_stock,
            last_updated: None,
        }
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.quantity, self.min_stock)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }

    pub fn is_overstocked(&self) -> bool {
        self.max_stock.is_some_and(|max| self.quantity > max)
    }

    /// Serializable view with the derived indicators attached
    pub fn level(self) -> StockLevel {
        StockLevel {
            status: self.status(),
            is_low_stock: self.is_low_stock(),
            is_out_of_stock: self.is_out_of_stock(),
            is_overstocked: self.is_overstocked(),
            record: self,
        }
    }
}

/// Inventory record plus its derived health indicators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub status: StockStatus,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
    pub is_overstocked: bool,
}

/// Low stock report row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LowStockItem {
    pub product_id: i64,
    pub product_name: String,
    pub product_code: String,
    pub store_id: i64,
    pub store_name: String,
    pub quantity: i32,
    pub min_stock: i32,
}

impl LowStockItem {
    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.quantity, self.min_stock)
    }
}

/// Input for a relative stock adjustment
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockInput {
    pub delta: i32,
    pub reason: Option<String>,
}

/// Input for an absolute stock set
#[derive(Debug, Clone, Deserialize)]
pub struct SetStockInput {
    pub quantity: i32,
    pub min_stock: Option<i32>,
    pub max_stock: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(StockStatus::classify(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(-3, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(1, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(6, 5), StockStatus::InStock);
        // a zero threshold never reports low stock
        assert_eq!(StockStatus::classify(1, 0), StockStatus::InStock);
    }

    #[test]
    fn test_record_flags_at_threshold() {
        let record = InventoryRecord {
            product_id: 1,
            store_id: 1,
            quantity: 5,
            min_stock: 5,
            max_stock: None,
            last_updated: None,
        };
        assert!(record.is_low_stock());
        assert!(!record.is_out_of_stock());
        assert_eq!(record.status(), StockStatus::LowStock);
    }

    #[test]
    fn test_synthetic_record_is_out_of_stock() {
        let level = InventoryRecord::synthetic(7, 3, 10, Some(100)).level();
        assert_eq!(level.record.quantity, 0);
        assert!(level.is_out_of_stock);
        assert_eq!(level.status, StockStatus::OutOfStock);
        assert!(level.record.last_updated.is_none());
    }

    #[test]
    fn test_apply_delta_without_backorder() {
        assert_eq!(apply_delta(5, -5, false), Ok(0));
        assert_eq!(
            apply_delta(1, -2, false),
            Err(StockError::Insufficient { available: 1, requested: 2 })
        );
        assert_eq!(apply_delta(0, 3, false), Ok(3));
    }

    #[test]
    fn test_apply_delta_with_backorder() {
        assert_eq!(apply_delta(1, -4, true), Ok(-3));
        // restocking a backordered item is always allowed
        assert_eq!(apply_delta(-3, 2, false), Ok(-1));
    }

    #[test]
    fn test_apply_delta_overflow() {
        assert_eq!(apply_delta(i32::MAX, 1, false), Err(StockError::Overflow));
    }

    #[test]
    fn test_level_serializes_flat() {
        let level = InventoryRecord::synthetic(1, 2, 5, None).level();
        let json = serde_json::to_value(&level).unwrap();
        assert_eq!(json["product_id"], 1);
        assert_eq!(json["status"], "out_of_stock");
        assert_eq!(json["is_out_of_stock"], true);
    }

    proptest! {
        /// Exactly one status holds for every quantity
        #[test]
        fn test_status_exclusive_and_exhaustive(quantity in any::<i32>(), min_stock in 0i32..10_000) {
            let out = quantity <= 0;
            let low = 0 < quantity && quantity <= min_stock;
            let ok = quantity > min_stock && quantity > 0;
            prop_assert_eq!([out, low, ok].iter().filter(|b| **b).count(), 1);

            let expected = if out {
                StockStatus::OutOfStock
            } else if low {
                StockStatus::LowStock
            } else {
                StockStatus::InStock
            };
            prop_assert_eq!(StockStatus::classify(quantity, min_stock), expected);
        }

        /// Without backorder a successful adjustment never goes negative
        #[test]
        fn test_no_backorder_never_negative(current in 0i32..1_000, delta in -2_000i32..2_000) {
            match apply_delta(current, delta, false) {
                Ok(next) => prop_assert!(next >= 0),
                Err(StockError::Insufficient { .. }) => prop_assert!(current + delta < 0),
                Err(StockError::Overflow) => prop_assert!(false, "no overflow in this range"),
            }
        }

        /// With backorder every in-range adjustment succeeds exactly
        #[test]
        fn test_backorder_always_applies(current in -1_000i32..1_000, delta in -1_000i32..1_000) {
            prop_assert_eq!(apply_delta(current, delta, true), Ok(current + delta));
        }
    }
}
