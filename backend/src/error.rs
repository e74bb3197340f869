//! Error handling for the Stockroom server
//!
//! Every failure leaves the server as `{"error": {"code", "message", "fields"?}}`
//! with a status taken from one fixed table.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{FieldError, StockError, TransitionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict {
        field: Option<String>,
        message: String,
    },

    // Business rule errors
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: i64,
        available: i32,
        requested: i32,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Access errors
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl AppError {
    /// Single-field validation failure
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn conflict(field: &str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    /// Attach the product to a ledger rule violation
    pub fn from_stock(product_id: i64, err: StockError) -> Self {
        match err {
            StockError::Insufficient {
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            StockError::Overflow => AppError::field("quantity", "Stock quantity out of range"),
        }
    }

    /// HTTP status for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InsufficientStock { .. }
            | AppError::InvalidStateTransition(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error kind
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Response body; internal details stay in the log
    pub fn detail(&self) -> ErrorDetail {
        let message = match self {
            AppError::Validation(_) => "One or more fields are invalid".to_string(),
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) | AppError::InternalError(_) => {
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        };
        let fields = match self {
            AppError::Validation(fields) => Some(fields.clone()),
            AppError::Conflict {
                field: Some(field),
                message,
            } => Some(vec![FieldError::new(field.as_str(), message.as_str())]),
            _ => None,
        };
        ErrorDetail {
            code: self.code().to_string(),
            message,
            fields,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                let field = db
                    .constraint()
                    .map(constraint_field)
                    .unwrap_or("record")
                    .to_string();
                AppError::Conflict {
                    message: format!("A record with this {} already exists", field),
                    field: Some(field),
                }
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<Vec<FieldError>> for AppError {
    fn from(fields: Vec<FieldError>) -> Self {
        AppError::Validation(fields)
    }
}

/// Map a unique constraint name to the offending field
fn constraint_field(constraint: &str) -> &str {
    match constraint {
        "products_code_key" => "code",
        "products_barcode_key" => "barcode",
        "stores_code_key" => "code",
        "users_username_key" => "username",
        "users_email_key" => "email",
        "sales_order_number_key" => "order_number",
        "inventory_product_store_unique" => "product_id",
        _ => "record",
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let cases = [
            (AppError::field("name", "required"), StatusCode::BAD_REQUEST),
            (
                AppError::InsufficientStock { product_id: 1, available: 0, requested: 1 },
                StatusCode::BAD_REQUEST,
            ),
            (AppError::InvalidStateTransition("x".into()), StatusCode::BAD_REQUEST),
            (AppError::not_found("Product"), StatusCode::NOT_FOUND),
            (AppError::conflict("code", "dup"), StatusCode::CONFLICT),
            (AppError::PermissionDenied("delete".into()), StatusCode::FORBIDDEN),
            (AppError::Unauthorized("no session".into()), StatusCode::UNAUTHORIZED),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_validation_detail_lists_fields() {
        let err = AppError::Validation(vec![
            FieldError::new("code", "bad"),
            FieldError::new("name", "missing"),
        ]);
        let detail = err.detail();
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert_eq!(detail.fields.map(|f| f.len()), Some(2));
    }

    #[test]
    fn test_internal_message_hidden() {
        let detail = AppError::Internal("secret path /etc".into()).detail();
        assert!(!detail.message.contains("/etc"));
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_stock_error_conversion() {
        let err = AppError::from_stock(
            7,
            StockError::Insufficient { available: 2, requested: 5 },
        );
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert!(err.to_string().contains("product 7"));
    }
}
