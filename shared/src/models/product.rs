//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::inventory::StockLevel;
use crate::types::double_option;
use crate::validation::{check_stock_bounds, validate_price, validate_product_code, FieldError};

/// Default global minimum stock level for new products
pub const DEFAULT_MIN_STOCK_LEVEL: i32 = 10;

/// Default global maximum stock level for new products
pub const DEFAULT_MAX_STOCK_LEVEL: i32 = 1000;

/// Product lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "product_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

/// A product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category_id: i64,
    pub cost_price: Option<Decimal>,
    pub selling_price: Decimal,
    pub msrp: Option<Decimal>,
    pub min_stock_level: i32,
    pub max_stock_level: Option<i32>,
    pub track_inventory: bool,
    pub allow_backorder: bool,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// `(selling - cost) / selling`, see [`profit_margin`]
    pub fn profit_margin(&self) -> Option<Decimal> {
        profit_margin(self.selling_price, self.cost_price)
    }

    /// Per-unit profit when the cost is known
    pub fn profit_amount(&self) -> Option<Decimal> {
        self.cost_price.map(|cost| self.selling_price - cost)
    }
}

/// Profit margin as a fraction of the selling price.
///
/// Undefined (`None`) when the selling price is zero or the cost is unset.
pub fn profit_margin(selling_price: Decimal, cost_price: Option<Decimal>) -> Option<Decimal> {
    let cost = cost_price?;
    if selling_price.is_zero() {
        return None;
    }
    Some(((selling_price - cost) / selling_price).round_dp(4))
}

/// An image reference held by the file storage collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub filename: String,
    pub url: String,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Product with derived stock and sales figures
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ProductImage>,
    pub inventory: Vec<StockLevel>,
    pub total_stock: i64,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
    pub profit_margin: Option<Decimal>,
    pub profit_amount: Option<Decimal>,
    pub units_sold: i64,
    pub sales_value: Decimal,
}

/// Initial quantity for one store, applied when a product is created
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InitialStock {
    pub store_id: i64,
    #[validate(range(min = 0, message = "Initial quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub min_stock: Option<i32>,
}

/// Input for creating a product.
///
/// Required fields are optional here so a request missing several of them
/// is reported field by field instead of failing at deserialization.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(required(message = "Name is required"), length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(required(message = "Product code is required"), custom = "validate_product_code")]
    pub code: Option<String>,
    #[validate(length(max = 100))]
    pub barcode: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(required(message = "Category is required"))]
    pub category_id: Option<i64>,
    #[validate(custom = "validate_price")]
    pub cost_price: Option<Decimal>,
    #[validate(required(message = "Selling price is required"), custom = "validate_price")]
    pub selling_price: Option<Decimal>,
    #[validate(custom = "validate_price")]
    pub msrp: Option<Decimal>,
    #[validate(range(min = 0, message = "Minimum stock level cannot be negative"))]
    pub min_stock_level: Option<i32>,
    #[validate(range(min = 0, message = "Maximum stock level cannot be negative"))]
    pub max_stock_level: Option<i32>,
    pub track_inventory: Option<bool>,
    pub allow_backorder: Option<bool>,
    #[serde(default)]
    pub initial_stock: Vec<InitialStock>,
}

impl CreateProductInput {
    /// Validate every field, reporting all violations together
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        let mut extra = Vec::new();
        if let Some(name) = &self.name {
            if !name.is_empty() && name.trim().is_empty() {
                extra.push(FieldError::new("name", "Name must not be blank"));
            }
        }
        extra.extend(check_stock_bounds(
            self.min_stock_level,
            self.max_stock_level,
            "max_stock_level",
        ));
        for (idx, entry) in self.initial_stock.iter().enumerate() {
            if let Err(errs) = crate::validation::collect(entry, Vec::new()) {
                extra.extend(errs.into_iter().map(|e| {
                    FieldError::new(format!("initial_stock[{}].{}", idx, e.field), e.message)
                }));
            }
        }
        crate::validation::collect(self, extra)
    }
}

/// Partial product update. Nullable fields take an explicit `null` to clear
/// them; an absent field is left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(custom = "validate_product_code")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    pub barcode: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100))]
    pub brand: Option<Option<String>>,
    pub category_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(custom = "validate_price")]
    pub cost_price: Option<Option<Decimal>>,
    #[validate(custom = "validate_price")]
    pub selling_price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(custom = "validate_price")]
    pub msrp: Option<Option<Decimal>>,
    #[validate(range(min = 0))]
    pub min_stock_level: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    pub max_stock_level: Option<Option<i32>>,
    pub track_inventory: Option<bool>,
    pub allow_backorder: Option<bool>,
    pub status: Option<ProductStatus>,
}

impl UpdateProductInput {
    /// Validate against the merged result of `existing` and this update
    pub fn check(&self, existing: &Product) -> Result<(), Vec<FieldError>> {
        let min = self.min_stock_level.unwrap_or(existing.min_stock_level);
        let max = self.max_stock_level.unwrap_or(existing.max_stock_level);
        let extra = check_stock_bounds(Some(min), max, "max_stock_level")
            .into_iter()
            .collect();
        crate::validation::collect(self, extra)
    }
}

/// Input for attaching an image reference
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddImageInput {
    #[validate(length(min = 1, max = 200))]
    pub filename: String,
    #[validate(length(min = 1, max = 500))]
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Product listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<i64>,
    pub status: Option<ProductStatus>,
    /// Free text over name, code and barcode
    pub search: Option<String>,
    pub store_id: Option<i64>,
}

/// Catalog-wide product statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductStats {
    pub total_products: i64,
    pub active_products: i64,
    pub inactive_products: i64,
    pub low_stock_records: i64,
    pub out_of_stock_records: i64,
    pub inventory_value_at_cost: Decimal,
    pub inventory_value_at_retail: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_profit_margin() {
        assert_eq!(profit_margin(dec("10"), Some(dec("6"))), Some(dec("0.4")));
        assert_eq!(profit_margin(dec("200"), Some(dec("250"))), Some(dec("-0.25")));
    }

    #[test]
    fn test_profit_margin_undefined_at_zero_price() {
        assert_eq!(profit_margin(Decimal::ZERO, Some(dec("5"))), None);
        assert_eq!(profit_margin(Decimal::ZERO, Some(Decimal::ZERO)), None);
    }

    #[test]
    fn test_profit_margin_undefined_without_cost() {
        assert_eq!(profit_margin(dec("10"), None), None);
    }

    #[test]
    fn test_missing_required_fields_all_reported() {
        let input = CreateProductInput::default();
        let errors = input.check().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["category_id", "code", "name", "selling_price"]);
    }

    #[test]
    fn test_invalid_values_reported_together() {
        let input = CreateProductInput {
            name: Some("Widget".into()),
            code: Some("bad code".into()),
            category_id: Some(1),
            selling_price: Some(dec("-1")),
            min_stock_level: Some(50),
            max_stock_level: Some(10),
            initial_stock: vec![InitialStock { store_id: 1, quantity: -4, min_stock: None }],
            ..Default::default()
        };
        let errors = input.check().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["code", "initial_stock[0].quantity", "max_stock_level", "selling_price"]
        );
    }

    #[test]
    fn test_valid_product_input() {
        let input = CreateProductInput {
            name: Some("Widget".into()),
            code: Some("SKU1".into()),
            category_id: Some(1),
            selling_price: Some(dec("10")),
            min_stock_level: Some(5),
            ..Default::default()
        };
        assert!(input.check().is_ok());
    }

    fn sample_product() -> Product {
        Product {
            id: 1,
            code: "SKU1".into(),
            barcode: None,
            name: "Widget".into(),
            description: None,
            brand: None,
            category_id: 1,
            cost_price: None,
            selling_price: dec("10"),
            msrp: None,
            min_stock_level: 5,
            max_stock_level: Some(100),
            track_inventory: true,
            allow_backorder: false,
            status: ProductStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_checks_merged_bounds() {
        let existing = sample_product();
        let raise_min = UpdateProductInput {
            min_stock_level: Some(500),
            ..Default::default()
        };
        assert!(raise_min.check(&existing).is_err());
        let rename = UpdateProductInput {
            name: Some("Gadget".into()),
            ..Default::default()
        };
        assert!(rename.check(&existing).is_ok());

        let clear_max = UpdateProductInput {
            min_stock_level: Some(500),
            max_stock_level: Some(None),
            ..Default::default()
        };
        assert!(clear_max.check(&existing).is_ok());
    }

    #[test]
    fn test_explicit_null_clears_and_absent_keeps() {
        let input: UpdateProductInput =
            serde_json::from_str(r#"{"cost_price":null,"msrp":"12.50","name":"Gadget"}"#).unwrap();
        assert_eq!(input.cost_price, Some(None));
        assert_eq!(input.msrp, Some(Some(dec("12.50"))));
        assert_eq!(input.barcode, None);
        assert_eq!(input.max_stock_level, None);

        let negative: UpdateProductInput = serde_json::from_str(r#"{"cost_price":"-1"}"#).unwrap();
        let errors = negative.check(&sample_product()).unwrap_err();
        assert_eq!(errors[0].field, "cost_price");
    }
}
