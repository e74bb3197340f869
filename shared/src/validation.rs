//! Validation utilities for the Stockroom platform
//!
//! Input structs derive `validator::Validate`; the helpers here turn the
//! collected `ValidationErrors` into a flat, field-ordered list so that a
//! rejected request reports every violated field at once.

use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

/// A single violated field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Flatten `ValidationErrors` into one entry per violation, ordered by field
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| default_message(&e.code)),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn default_message(code: &str) -> String {
    match code {
        "required" => "This field is required".to_string(),
        "length" => "Invalid length".to_string(),
        "email" => "Invalid email format".to_string(),
        "range" => "Value out of range".to_string(),
        other => format!("Invalid value ({})", other),
    }
}

/// Run derive validation and append extra checks; `Err` lists every problem
pub fn collect<T: validator::Validate>(
    input: &T,
    extra: Vec<FieldError>,
) -> Result<(), Vec<FieldError>> {
    let mut errors = match input.validate() {
        Ok(()) => Vec::new(),
        Err(e) => field_errors(&e),
    };
    errors.extend(extra);
    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        Err(errors)
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Product codes (SKUs): 1-50 chars of letters, digits, `-`, `_` or `.`
pub fn validate_product_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(invalid("code", "Product code must not be blank"));
    }
    if code.len() > 50 {
        return Err(invalid("code", "Product code must be at most 50 characters"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(
            "code",
            "Product code may only contain letters, digits, '-', '_' and '.'",
        ));
    }
    Ok(())
}

/// Store codes: 2-10 uppercase alphanumeric (e.g. "ST001")
pub fn validate_store_code(code: &str) -> Result<(), ValidationError> {
    if code.len() < 2 || code.len() > 10 {
        return Err(invalid("store_code", "Store code must be 2-10 characters"));
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err(invalid(
            "store_code",
            "Store code must be uppercase alphanumeric only",
        ));
    }
    Ok(())
}

/// Prices are never negative
pub fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(invalid("price", "Price cannot be negative"));
    }
    Ok(())
}

/// Colors are `#RRGGBB`
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(invalid("color", "Color must be a hex value like #7C3AED"))
    }
}

/// Thresholds must satisfy `min <= max` when both are present
pub fn check_stock_bounds(min: Option<i32>, max: Option<i32>, field: &str) -> Option<FieldError> {
    match (min, max) {
        (Some(min), Some(max)) if max < min => Some(FieldError::new(
            field,
            format!("Maximum stock ({}) is below minimum stock ({})", max, min),
        )),
        _ => None,
    }
}

// ============================================================================
// Account Validations
// ============================================================================

/// Usernames: 3-80 chars of letters, digits, `.`, `_` or `-`
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() < 3 || username.len() > 80 {
        return Err(invalid("username", "Username must be 3-80 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid(
            "username",
            "Username may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 8 {
        return Err(invalid("password", "Password must be at least 8 characters"));
    }
    Ok(())
}
