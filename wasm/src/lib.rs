//! WebAssembly module for the Stockroom inventory platform
//!
//! Lets the browser apply the same rules as the backend before a request
//! is sent:
//! - Stock status and margin display
//! - Sale status buttons
//! - Form validation

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Classify a quantity against its minimum threshold
#[wasm_bindgen]
pub fn stock_status(quantity: i32, min_stock: i32) -> String {
    StockStatus::classify(quantity, min_stock).as_str().to_string()
}

/// Profit margin as a decimal string, or `None` when undefined
#[wasm_bindgen]
pub fn calculate_profit_margin(selling_price: &str, cost_price: Option<String>) -> Result<Option<String>, JsValue> {
    let selling = parse_decimal("selling_price", selling_price)?;
    let cost = cost_price
        .as_deref()
        .map(|c| parse_decimal("cost_price", c))
        .transpose()?;
    Ok(profit_margin(selling, cost).map(|m| m.to_string()))
}

/// Statuses a sale may move to next, as a JSON array
#[wasm_bindgen]
pub fn next_sale_statuses(status: &str) -> Result<String, JsValue> {
    let current = SaleStatus::parse(status)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown sale status: {}", status)))?;
    serde_json::to_string(current.next_statuses())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Preview whether a stock adjustment would be accepted
#[wasm_bindgen]
pub fn can_adjust_stock(current: i32, delta: i32, allow_backorder: bool) -> bool {
    apply_delta(current, delta, allow_backorder).is_ok()
}

/// Validate a product form; returns a JSON array of field errors (empty when valid)
#[wasm_bindgen]
pub fn validate_product(input_json: &str) -> Result<String, JsValue> {
    let input: CreateProductInput = serde_json::from_str(input_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid product JSON: {}", e)))?;
    let errors = input.check().err().unwrap_or_default();
    serde_json::to_string(&errors).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Validate a sale form; returns a JSON array of field errors (empty when valid)
#[wasm_bindgen]
pub fn validate_sale(input_json: &str) -> Result<String, JsValue> {
    let input: CreateSaleInput = serde_json::from_str(input_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid sale JSON: {}", e)))?;
    let errors = input.check().err().unwrap_or_default();
    serde_json::to_string(&errors).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|_| JsValue::from_str(&format!("{} is not a number: {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status() {
        assert_eq!(stock_status(0, 5), "out_of_stock");
        assert_eq!(stock_status(5, 5), "low_stock");
        assert_eq!(stock_status(6, 5), "in_stock");
    }

    #[test]
    fn test_can_adjust_stock() {
        assert!(can_adjust_stock(5, -5, false));
        assert!(!can_adjust_stock(5, -6, false));
        assert!(can_adjust_stock(5, -6, true));
    }

    #[test]
    fn test_next_sale_statuses() {
        assert_eq!(next_sale_statuses("confirmed").unwrap(), r#"["packed","refunded"]"#);
        assert_eq!(next_sale_statuses("shipped").unwrap(), "[]");
    }

    #[test]
    fn test_validate_product_lists_fields() {
        let json = validate_product(r#"{"name":"Widget","selling_price":"-1"}"#).unwrap();
        let errors: Vec<FieldError> = serde_json::from_str(&json).unwrap();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["category_id", "code", "selling_price"]);
    }

    #[test]
    fn test_validate_sale_ok() {
        let json = validate_sale(r#"{"store_id":1,"items":[{"product_id":2,"quantity":1}]}"#).unwrap();
        assert_eq!(json, "[]");
    }
}
