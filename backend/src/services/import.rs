//! CSV product import
//!
//! Rows are parsed up front, then each valid row commits in its own
//! transaction so one bad row never aborts the batch.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{validate_product_code, CreateProductInput, FieldError};
use sqlx::{PgConnection, PgPool};

use crate::config::ImportConfig;
use crate::error::{AppError, AppResult};
use crate::services::inventory::{load_policy, set_quantity};
use crate::services::products::insert_product;

/// Column headers of an import file, in template order
pub const IMPORT_HEADERS: [&str; 7] = [
    "Product Name",
    "Product Code",
    "Quantity",
    "Price",
    "Cost Price",
    "Category",
    "Store",
];

const REQUIRED_HEADERS: [&str; 2] = ["Product Name", "Product Code"];

/// One parsed, well-formed import row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    /// 1-based position among the data rows
    pub row: usize,
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub category: Option<String>,
    pub store: Option<String>,
}

/// A rejected row with every problem found in it
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub fields: Vec<FieldError>,
}

/// Outcome of parsing a file
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub rows: Vec<ImportRow>,
    pub failures: Vec<RowFailure>,
}

/// Outcome of an import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<RowFailure>,
}

/// Parse an import file. Header names are matched case-insensitively;
/// a file without the name and code columns is rejected as a whole.
pub fn parse_csv(data: &[u8]) -> AppResult<ParsedImport> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AppError::field("file", format!("Unreadable CSV header: {}", e)))?
        .clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| (h.trim_start_matches('\u{feff}').to_lowercase(), idx))
        .collect();

    let missing: Vec<FieldError> = REQUIRED_HEADERS
        .iter()
        .filter(|h| !columns.contains_key(&h.to_lowercase()))
        .map(|h| FieldError::new("file", format!("Missing column '{}'", h)))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }

    let mut parsed = ParsedImport::default();
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                parsed.failures.push(RowFailure {
                    row,
                    fields: vec![FieldError::new("row", format!("Malformed row: {}", e))],
                });
                continue;
            }
        };
        let cell = |header: &str| {
            columns
                .get(&header.to_lowercase())
                .and_then(|&i| record.get(i))
                .filter(|v| !v.is_empty())
        };

        match parse_row(row, cell) {
            Ok(parsed_row) => parsed.rows.push(parsed_row),
            Err(fields) => parsed.failures.push(RowFailure { row, fields }),
        }
    }

    Ok(parsed)
}

fn parse_row<'a>(
    row: usize,
    cell: impl Fn(&str) -> Option<&'a str>,
) -> Result<ImportRow, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = cell("Product Name");
    if name.is_none() {
        errors.push(FieldError::new("name", "Product name is required"));
    }

    let code = cell("Product Code");
    match code {
        None => errors.push(FieldError::new("code", "Product code is required")),
        Some(code) => {
            if let Err(e) = validate_product_code(code) {
                let message = e.message.map(|m| m.to_string()).unwrap_or_else(|| "Invalid product code".into());
                errors.push(FieldError::new("code", message));
            }
        }
    }

    let quantity = match cell("Quantity").map(str::parse::<i32>) {
        None => Some(0),
        Some(Ok(q)) if q >= 0 => Some(q),
        Some(Ok(_)) => {
            errors.push(FieldError::new("quantity", "Quantity cannot be negative"));
            None
        }
        Some(Err(_)) => {
            errors.push(FieldError::new("quantity", "Quantity must be a whole number"));
            None
        }
    };

    let price = match cell("Price") {
        None => {
            errors.push(FieldError::new("price", "Price is required"));
            None
        }
        Some(raw) => parse_money(raw, "price", &mut errors),
    };
    let cost_price = cell("Cost Price").and_then(|raw| parse_money(raw, "cost_price", &mut errors));

    match (name, code, quantity, price) {
        (Some(name), Some(code), Some(quantity), Some(price)) if errors.is_empty() => Ok(ImportRow {
            row,
            name: name.to_string(),
            code: code.to_string(),
            quantity,
            price,
            cost_price,
            category: cell("Category").map(str::to_string),
            store: cell("Store").map(str::to_string),
        }),
        _ => Err(errors),
    }
}

fn parse_money(raw: &str, field: &str, errors: &mut Vec<FieldError>) -> Option<Decimal> {
    match raw.trim_start_matches('$').parse::<Decimal>() {
        Ok(value) if value.is_sign_negative() && !value.is_zero() => {
            errors.push(FieldError::new(field, "Amount cannot be negative"));
            None
        }
        Ok(value) => Some(value.round_dp(2)),
        Err(_) => {
            errors.push(FieldError::new(field, "Amount must be a number"));
            None
        }
    }
}

/// The downloadable import template: header plus sample rows
pub fn template_csv() -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    let rows: [[&str; 7]; 3] = [
        ["Sample Product 1", "SP001", "100", "29.99", "15.00", "Electronics", "Main Store"],
        ["Sample Product 2", "SP002", "50", "49.99", "25.00", "Clothing", "Main Store"],
        ["Sample Product 3", "SP003", "75", "19.99", "10.00", "Books", "Branch Store"],
    ];

    writer
        .write_record(IMPORT_HEADERS)
        .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 error: {}", e)))
}

/// Import service
#[derive(Clone)]
pub struct ImportService {
    db: PgPool,
    defaults: ImportConfig,
}

enum RowOutcome {
    Created,
    Updated,
}

impl ImportService {
    pub fn new(db: PgPool, defaults: ImportConfig) -> Self {
        Self { db, defaults }
    }

    /// Parse and import a file; per-row failures are reported, not raised
    pub async fn import_csv(&self, data: &[u8]) -> AppResult<ImportReport> {
        let parsed = parse_csv(data)?;
        let mut report = ImportReport {
            imported: 0,
            created: 0,
            updated: 0,
            failed: parsed.failures,
        };

        for row in &parsed.rows {
            match self.import_row(row).await {
                Ok(RowOutcome::Created) => report.created += 1,
                Ok(RowOutcome::Updated) => report.updated += 1,
                Err(err) => {
                    tracing::warn!(row = row.row, code = %row.code, error = %err, "Import row failed");
                    report.failed.push(RowFailure {
                        row: row.row,
                        fields: failure_fields(err),
                    });
                }
            }
        }
        report.imported = report.created + report.updated;
        report.failed.sort_by_key(|f| f.row);

        tracing::info!(
            imported = report.imported,
            created = report.created,
            updated = report.updated,
            failed = report.failed.len(),
            "CSV import finished"
        );
        Ok(report)
    }

    async fn import_row(&self, row: &ImportRow) -> AppResult<RowOutcome> {
        let mut tx = self.db.begin().await?;

        let category_id = self.resolve_category(&mut *tx, row.category.as_deref()).await?;
        let store_id = self.resolve_store(&mut *tx, row.store.as_deref()).await?;

        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE code = $1 FOR UPDATE")
            .bind(&row.code)
            .fetch_optional(&mut *tx)
            .await?;

        let (product_id, outcome) = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE products SET
                        selling_price = $2,
                        cost_price = COALESCE($3, cost_price),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(row.price)
                .bind(row.cost_price)
                .execute(&mut *tx)
                .await?;
                (id, RowOutcome::Updated)
            }
            None => {
                let input = CreateProductInput {
                    name: Some(row.name.clone()),
                    code: Some(row.code.clone()),
                    category_id: Some(category_id),
                    selling_price: Some(row.price),
                    cost_price: row.cost_price,
                    min_stock_level: Some(self.defaults.default_min_stock),
                    ..Default::default()
                };
                let product = insert_product(&mut *tx, &input).await?;
                (product.id, RowOutcome::Created)
            }
        };

        let policy = load_policy(&mut *tx, product_id).await?;
        set_quantity(&mut *tx, &policy, store_id, row.quantity, None, None).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Active category by name, else the default category (created on demand)
    async fn resolve_category(&self, conn: &mut PgConnection, name: Option<&str>) -> AppResult<i64> {
        if let Some(id) = find_category(&mut *conn, name.unwrap_or(&self.defaults.default_category_name)).await? {
            return Ok(id);
        }
        if let Some(id) = find_category(&mut *conn, &self.defaults.default_category_name).await? {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i64>("INSERT INTO categories (name) VALUES ($1) RETURNING id")
            .bind(&self.defaults.default_category_name)
            .fetch_one(&mut *conn)
            .await?;
        tracing::info!(category_id = id, name = %self.defaults.default_category_name, "Created default import category");
        Ok(id)
    }

    /// Active store by name or code, else the default store (created on demand)
    async fn resolve_store(&self, conn: &mut PgConnection, name: Option<&str>) -> AppResult<i64> {
        if let Some(id) = find_store(&mut *conn, name.unwrap_or(&self.defaults.default_store_name)).await? {
            return Ok(id);
        }
        if let Some(id) = find_store(&mut *conn, &self.defaults.default_store_name).await? {
            return Ok(id);
        }
        if let Some(id) = find_store(&mut *conn, &self.defaults.default_store_code).await? {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stores (name, code, address, city, state, postal_code)
            VALUES ($1, $2, '', '', '', '')
            RETURNING id
            "#,
        )
        .bind(&self.defaults.default_store_name)
        .bind(&self.defaults.default_store_code)
        .fetch_one(&mut *conn)
        .await?;
        tracing::info!(store_id = id, name = %self.defaults.default_store_name, "Created default import store");
        Ok(id)
    }
}

async fn find_category(conn: &mut PgConnection, name: &str) -> AppResult<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM categories
        WHERE LOWER(name) = LOWER($1) AND is_active
        ORDER BY parent_id NULLS FIRST, id
        LIMIT 1
        "#,
    )
    .bind(name.trim())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

async fn find_store(conn: &mut PgConnection, name_or_code: &str) -> AppResult<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM stores
        WHERE (LOWER(name) = LOWER($1) OR code = UPPER($1)) AND is_active
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(name_or_code.trim())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

/// Field-level detail of a failed row
fn failure_fields(err: AppError) -> Vec<FieldError> {
    match err {
        AppError::Validation(fields) => fields,
        AppError::Conflict { field, message } => {
            vec![FieldError::new(field.unwrap_or_else(|| "row".into()), message)]
        }
        other => vec![FieldError::new("row", other.detail().message)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_collects_per_row_failures() {
        let data = "Product Name,Product Code,Quantity,Price,Cost Price,Category,Store\n\
                    Widget,W-1,10,9.99,4.00,Tools,Main Store\n\
                    ,W-2,5,1.00,,Tools,Main Store\n\
                    Gadget,G-1,,19.50,,,\n";
        let parsed = parse_csv(data.as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].row, 1);
        assert_eq!(parsed.rows[0].cost_price, Some(dec("4.00")));
        assert_eq!(parsed.rows[1].row, 3);
        assert_eq!(parsed.rows[1].quantity, 0);
        assert_eq!(parsed.rows[1].category, None);

        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].row, 2);
        assert_eq!(parsed.failures[0].fields[0].field, "name");
    }

    #[test]
    fn test_parse_reports_every_bad_field() {
        let data = "Product Name,Product Code,Quantity,Price\n,,-3,abc\n";
        let parsed = parse_csv(data.as_bytes()).unwrap();
        let fields: Vec<&str> = parsed.failures[0].fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "code", "quantity", "price"]);
    }

    #[test]
    fn test_parse_headers_are_case_insensitive() {
        let data = "product name,PRODUCT CODE,quantity,price\nWidget,W-1,3,2.50\n";
        let parsed = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].price, dec("2.50"));
    }

    #[test]
    fn test_parse_rejects_file_without_code_column() {
        let data = "Product Name,Quantity\nWidget,3\n";
        let err = parse_csv(data.as_bytes()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_template_parses_cleanly() {
        let template = template_csv().unwrap();
        assert!(template.starts_with("Product Name,Product Code,Quantity,Price,Cost Price,Category,Store"));
        let parsed = parse_csv(template.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 3);
        assert!(parsed.failures.is_empty());
    }

    #[test]
    fn test_failure_fields_keep_conflict_field() {
        let fields = failure_fields(AppError::conflict("code", "Code taken"));
        assert_eq!(fields[0].field, "code");
        let fields = failure_fields(AppError::not_found("Product"));
        assert_eq!(fields[0].field, "row");
    }
}
