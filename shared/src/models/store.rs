//! Store (location) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::{validate_store_code, FieldError};

/// A store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager_name: Option<String>,
    pub image: Option<String>,
    pub timezone: String,
    pub operating_hours: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn full_address(&self) -> String {
        format!(
            "{}, {}, {} {}, {}",
            self.address, self.city, self.state, self.postal_code, self.country
        )
    }
}

/// Store with derived operating figures
#[derive(Debug, Clone, Serialize)]
pub struct StoreWithStats {
    #[serde(flatten)]
    pub store: Store,
    pub full_address: String,
    pub employees_count: i64,
    pub unique_products_count: i64,
    pub total_units_on_hand: i64,
    pub low_stock_items_count: i64,
    pub revenue_today: Decimal,
    pub revenue_this_month: Decimal,
}

/// Input for creating a store
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStoreInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(custom = "validate_store_code")]
    pub code: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 50, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 50))]
    pub country: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub manager_name: Option<String>,
    #[validate(length(max = 200))]
    pub image: Option<String>,
    #[validate(length(max = 50))]
    pub timezone: Option<String>,
    pub operating_hours: Option<String>,
}

impl CreateStoreInput {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        crate::validation::collect(self, Vec::new())
    }
}

/// Partial store update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStoreInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom = "validate_store_code")]
    pub code: Option<String>,
    #[validate(length(min = 1))]
    pub address: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub country: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub manager_name: Option<String>,
    #[validate(length(max = 200))]
    pub image: Option<String>,
    #[validate(length(max = 50))]
    pub timezone: Option<String>,
    pub operating_hours: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateStoreInput {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        crate::validation::collect(self, Vec::new())
    }
}

/// Store listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateStoreInput {
        CreateStoreInput {
            name: "Downtown".into(),
            code: "ST001".into(),
            address: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62701".into(),
            country: None,
            phone: None,
            email: Some("downtown@example.com".into()),
            manager_name: None,
            image: None,
            timezone: None,
            operating_hours: None,
        }
    }

    #[test]
    fn test_valid_store() {
        assert!(input().check().is_ok());
    }

    #[test]
    fn test_store_errors_listed() {
        let mut bad = input();
        bad.code = "st-1".into();
        bad.city = "".into();
        bad.email = Some("nope".into());
        let errors = bad.check().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["city", "code", "email"]);
    }
}
