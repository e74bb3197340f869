//! Product catalog service: products, their initial stock and image references

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use shared::{
    AddImageInput, CreateProductInput, FieldError, InventoryRecord, PaginatedResponse, Pagination,
    Product, ProductDetail, ProductFilter, ProductImage, ProductStats, UpdateProductInput,
    DEFAULT_MAX_STOCK_LEVEL, DEFAULT_MIN_STOCK_LEVEL,
};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};

pub const PRODUCT_COLUMNS: &str = "id, code, barcode, name, description, brand, category_id, \
     cost_price, selling_price, msrp, min_stock_level, max_stock_level, track_inventory, \
     allow_backorder, status, created_at, updated_at";

pub(crate) const IMAGE_COLUMNS: &str = "id, product_id, filename, url, is_primary, sort_order, created_at";

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Lifetime sales of one product
#[derive(sqlx::FromRow)]
struct SalesTotalsRow {
    units_sold: i64,
    sales_value: Decimal,
}

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Paginated product listing ordered by id
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        let search = filter.search.as_deref().map(|s| format!("%{}%", s.trim()));
        let where_clause = r#"
            WHERE ($1::BIGINT IS NULL OR category_id = $1)
              AND ($2::product_status IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR name ILIKE $3 OR code ILIKE $3 OR barcode ILIKE $3)
              AND ($4::BIGINT IS NULL OR EXISTS (
                    SELECT 1 FROM inventory i WHERE i.product_id = products.id AND i.store_id = $4))
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM products {}",
            where_clause
        ))
        .bind(filter.category_id)
        .bind(filter.status)
        .bind(&search)
        .bind(filter.store_id)
        .fetch_one(&self.db)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products {} ORDER BY id, created_at LIMIT $5 OFFSET $6",
            PRODUCT_COLUMNS, where_clause
        ))
        .bind(filter.category_id)
        .bind(filter.status)
        .bind(&search)
        .bind(filter.store_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(products, pagination, total as u64))
    }

    pub async fn find(&self, product_id: i64) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
    }

    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE code = $1",
            PRODUCT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?;
        Ok(product)
    }

    /// Product with images, per-store stock and lifetime sales
    pub async fn get_product_detail(&self, product_id: i64) -> AppResult<ProductDetail> {
        let product = self.find(product_id).await?;
        let images = self.list_images(product_id).await?;

        let inventory = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT product_id, store_id, quantity, min_stock, max_stock, last_updated
            FROM inventory WHERE product_id = $1 ORDER BY store_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        let sales = sqlx::query_as::<_, SalesTotalsRow>(
            r#"
            SELECT COALESCE(SUM(si.quantity), 0)::BIGINT AS units_sold,
                   COALESCE(SUM(si.quantity * si.unit_price), 0) AS sales_value
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE si.product_id = $1 AND s.status <> 'refunded'
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let total_stock: i64 = inventory.iter().map(|r| i64::from(r.quantity)).sum();
        let min_total = i64::from(product.min_stock_level);

        Ok(ProductDetail {
            total_stock,
            is_low_stock: total_stock <= min_total,
            is_out_of_stock: total_stock <= 0,
            profit_margin: product.profit_margin(),
            profit_amount: product.profit_amount(),
            units_sold: sales.units_sold,
            sales_value: sales.sales_value,
            inventory: inventory.into_iter().map(InventoryRecord::level).collect(),
            images,
            product,
        })
    }

    /// Create a product and its initial inventory records atomically
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        let mut errors = input.check().err().unwrap_or_default();
        let mut seen = BTreeSet::new();
        for (idx, entry) in input.initial_stock.iter().enumerate() {
            if !seen.insert(entry.store_id) {
                errors.push(FieldError::new(
                    format!("initial_stock[{}].store_id", idx),
                    "Store listed more than once",
                ));
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut tx = self.db.begin().await?;
        let product = insert_product(&mut *tx, &input).await?;

        for entry in &input.initial_stock {
            let store_exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1)")
                    .bind(entry.store_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !store_exists {
                return Err(AppError::field("initial_stock", format!("Store {} does not exist", entry.store_id)));
            }

            sqlx::query(
                r#"
                INSERT INTO inventory (product_id, store_id, quantity, min_stock, max_stock)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(product.id)
            .bind(entry.store_id)
            .bind(entry.quantity)
            .bind(entry.min_stock.unwrap_or(product.min_stock_level))
            .bind(product.max_stock_level)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            product_id = product.id,
            code = %product.code,
            initial_stores = input.initial_stock.len(),
            "Product created"
        );
        Ok(product)
    }

    /// Partial update; uniqueness of `code`/`barcode` is re-checked by the database
    pub async fn update_product(
        &self,
        product_id: i64,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let existing = self.find(product_id).await?;
        input.check(&existing)?;
        if let Some(category_id) = input.category_id {
            if category_id != existing.category_id {
                ensure_active_category(&self.db, category_id).await?;
            }
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                code = COALESCE($3, code),
                barcode = CASE WHEN $16 THEN $4 ELSE barcode END,
                description = CASE WHEN $17 THEN $5 ELSE description END,
                brand = CASE WHEN $18 THEN $6 ELSE brand END,
                category_id = COALESCE($7, category_id),
                cost_price = CASE WHEN $19 THEN $8 ELSE cost_price END,
                selling_price = COALESCE($9, selling_price),
                msrp = CASE WHEN $20 THEN $10 ELSE msrp END,
                min_stock_level = COALESCE($11, min_stock_level),
                max_stock_level = CASE WHEN $21 THEN $12 ELSE max_stock_level END,
                track_inventory = COALESCE($13, track_inventory),
                allow_backorder = COALESCE($14, allow_backorder),
                status = COALESCE($15, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.code.as_deref().map(str::trim))
        .bind(input.barcode.as_ref().and_then(|b| b.as_deref()).map(str::trim))
        .bind(input.description.as_ref().and_then(|d| d.as_deref()))
        .bind(input.brand.as_ref().and_then(|b| b.as_deref()))
        .bind(input.category_id)
        .bind(input.cost_price.flatten())
        .bind(input.selling_price)
        .bind(input.msrp.flatten())
        .bind(input.min_stock_level)
        .bind(input.max_stock_level.flatten())
        .bind(input.track_inventory)
        .bind(input.allow_backorder)
        .bind(input.status)
        .bind(input.barcode.is_some())
        .bind(input.description.is_some())
        .bind(input.brand.is_some())
        .bind(input.cost_price.is_some())
        .bind(input.msrp.is_some())
        .bind(input.max_stock_level.is_some())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id, "Product updated");
        Ok(product)
    }

    /// Soft delete: status becomes inactive, inventory is kept. Idempotent.
    pub async fn deactivate_product(&self, product_id: i64) -> AppResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET status = 'inactive',
                updated_at = CASE WHEN status = 'inactive' THEN updated_at ELSE NOW() END
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

        tracing::info!(product_id, "Product deactivated");
        Ok(product)
    }

    /// Catalog-wide counts and inventory valuation
    pub async fn product_stats(&self) -> AppResult<ProductStats> {
        let stats = sqlx::query_as::<_, ProductStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products) AS total_products,
                (SELECT COUNT(*) FROM products WHERE status = 'active') AS active_products,
                (SELECT COUNT(*) FROM products WHERE status = 'inactive') AS inactive_products,
                COUNT(*) FILTER (WHERE i.quantity > 0 AND i.quantity <= i.min_stock) AS low_stock_records,
                COUNT(*) FILTER (WHERE i.quantity <= 0) AS out_of_stock_records,
                COALESCE(SUM(GREATEST(i.quantity, 0) * COALESCE(p.cost_price, 0)), 0) AS inventory_value_at_cost,
                COALESCE(SUM(GREATEST(i.quantity, 0) * p.selling_price), 0) AS inventory_value_at_retail
            FROM inventory i
            JOIN products p ON p.id = i.product_id AND p.status = 'active'
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(stats)
    }

    pub async fn list_images(&self, product_id: i64) -> AppResult<Vec<ProductImage>> {
        let images = sqlx::query_as::<_, ProductImage>(&format!(
            "SELECT {} FROM product_images WHERE product_id = $1 ORDER BY sort_order, id",
            IMAGE_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(images)
    }

    /// Attach an image reference. The first image of a product becomes primary.
    pub async fn add_image(&self, product_id: i64, input: AddImageInput) -> AppResult<ProductImage> {
        shared::validation::collect(&input, Vec::new())?;
        let mut tx = self.db.begin().await?;
        lock_product(&mut *tx, product_id).await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
        let is_primary = input.is_primary || count == 0;
        if is_primary {
            clear_primary(&mut *tx, product_id).await?;
        }

        let image = sqlx::query_as::<_, ProductImage>(&format!(
            r#"
            INSERT INTO product_images (product_id, filename, url, is_primary, sort_order)
            VALUES ($1, $2, $3, $4,
                    (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM product_images WHERE product_id = $1))
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        ))
        .bind(product_id)
        .bind(&input.filename)
        .bind(&input.url)
        .bind(is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(product_id, image_id = image.id, is_primary, "Product image added");
        Ok(image)
    }

    /// Make one image the product's only primary image
    pub async fn set_primary_image(&self, product_id: i64, image_id: i64) -> AppResult<Vec<ProductImage>> {
        let mut tx = self.db.begin().await?;
        lock_product(&mut *tx, product_id).await?;
        clear_primary(&mut *tx, product_id).await?;

        let updated = sqlx::query("UPDATE product_images SET is_primary = TRUE WHERE id = $1 AND product_id = $2")
            .bind(image_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Product image"));
        }

        tx.commit().await?;
        self.list_images(product_id).await
    }

    /// Remove an image reference; the next image is promoted if the primary was removed
    pub async fn remove_image(&self, product_id: i64, image_id: i64) -> AppResult<Vec<ProductImage>> {
        let mut tx = self.db.begin().await?;
        lock_product(&mut *tx, product_id).await?;

        let was_primary = sqlx::query_scalar::<_, bool>(
            "DELETE FROM product_images WHERE id = $1 AND product_id = $2 RETURNING is_primary",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Product image"))?;

        if was_primary {
            sqlx::query(
                r#"
                UPDATE product_images SET is_primary = TRUE
                WHERE id = (SELECT id FROM product_images WHERE product_id = $1
                            ORDER BY sort_order, id LIMIT 1)
                "#,
            )
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.list_images(product_id).await
    }
}

/// Insert the product row; shared with the CSV importer
pub(crate) async fn insert_product(
    conn: &mut PgConnection,
    input: &CreateProductInput,
) -> AppResult<Product> {
    // presence was checked by `CreateProductInput::check`
    let missing = |field: &str| AppError::field(field, "This field is required");
    let name = input.name.as_deref().ok_or_else(|| missing("name"))?;
    let code = input.code.as_deref().ok_or_else(|| missing("code"))?;
    let category_id = input.category_id.ok_or_else(|| missing("category_id"))?;
    let selling_price = input.selling_price.ok_or_else(|| missing("selling_price"))?;

    ensure_active_category(&mut *conn, category_id).await?;

    let product = sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products (code, barcode, name, description, brand, category_id, cost_price,
                              selling_price, msrp, min_stock_level, max_stock_level,
                              track_inventory, allow_backorder)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(code.trim())
    .bind(input.barcode.as_deref().map(str::trim).filter(|b| !b.is_empty()))
    .bind(name.trim())
    .bind(&input.description)
    .bind(&input.brand)
    .bind(category_id)
    .bind(input.cost_price)
    .bind(selling_price)
    .bind(input.msrp)
    .bind(input.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK_LEVEL))
    .bind(input.max_stock_level.unwrap_or(DEFAULT_MAX_STOCK_LEVEL))
    .bind(input.track_inventory.unwrap_or(true))
    .bind(input.allow_backorder.unwrap_or(false))
    .fetch_one(&mut *conn)
    .await?;

    Ok(product)
}

async fn ensure_active_category<'c, E>(executor: E, category_id: i64) -> AppResult<()>
where
    E: sqlx::PgExecutor<'c>,
{
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(executor)
        .await?;
    match active {
        Some(true) => Ok(()),
        Some(false) => Err(AppError::field("category_id", "Category is inactive")),
        None => Err(AppError::field("category_id", "Category does not exist")),
    }
}

/// Serialize image changes of one product
async fn lock_product(conn: &mut PgConnection, product_id: i64) -> AppResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(())
}

async fn clear_primary(conn: &mut PgConnection, product_id: i64) -> AppResult<()> {
    sqlx::query("UPDATE product_images SET is_primary = FALSE WHERE product_id = $1 AND is_primary")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
