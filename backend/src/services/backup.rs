//! Backup snapshot and the non-secret system settings view

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{Category, InventoryRecord, Product, ProductImage, Sale, SaleLineItem, Store, User};
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::categories::CATEGORY_COLUMNS;
use crate::services::inventory::RECORD_COLUMNS;
use crate::services::products::{IMAGE_COLUMNS, PRODUCT_COLUMNS};
use crate::services::sales::{ITEM_COLUMNS, SALE_COLUMNS};
use crate::services::stores::STORE_COLUMNS;
use crate::services::users::USER_COLUMNS;

pub const BACKUP_FORMAT_VERSION: &str = "1.0.0";

/// Full snapshot of the business data, serialized as one JSON document
#[derive(Debug, Serialize)]
pub struct BackupSnapshot {
    pub metadata: BackupMetadata,
    pub data: BackupData,
}

#[derive(Debug, Serialize)]
pub struct BackupMetadata {
    pub created_at: DateTime<Utc>,
    pub version: &'static str,
    pub app_version: &'static str,
    pub backup_type: &'static str,
}

/// Table contents; users never carry password hashes
#[derive(Debug, Serialize)]
pub struct BackupData {
    pub categories: Vec<Category>,
    pub stores: Vec<Store>,
    pub products: Vec<Product>,
    pub product_images: Vec<ProductImage>,
    pub inventory: Vec<InventoryRecord>,
    pub sales: Vec<Sale>,
    pub sale_items: Vec<SaleLineItem>,
    pub users: Vec<User>,
}

/// Row counts per table
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DatabaseStats {
    pub total_products: i64,
    pub total_categories: i64,
    pub total_stores: i64,
    pub total_users: i64,
    pub total_sales: i64,
    pub total_inventory_records: i64,
}

#[derive(Debug, Serialize)]
pub struct SystemConfigView {
    pub version: &'static str,
    pub environment: String,
    pub database_stats: DatabaseStats,
    pub import_defaults: ImportDefaults,
    pub session: SessionSettings,
}

#[derive(Debug, Serialize)]
pub struct ImportDefaults {
    pub store_name: String,
    pub store_code: String,
    pub category_name: String,
    pub min_stock: i32,
}

#[derive(Debug, Serialize)]
pub struct SessionSettings {
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    pub cookie_name: String,
}

/// Backup service
#[derive(Clone)]
pub struct BackupService {
    db: PgPool,
}

impl BackupService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Read every table inside one repeatable-read, read-only transaction
    /// so the snapshot is internally consistent
    pub async fn dump_all(&self) -> AppResult<BackupSnapshot> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories ORDER BY id",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let stores = sqlx::query_as::<_, Store>(&format!("SELECT {} FROM stores ORDER BY id", STORE_COLUMNS))
            .fetch_all(&mut *tx)
            .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let product_images = sqlx::query_as::<_, ProductImage>(&format!(
            "SELECT {} FROM product_images ORDER BY product_id, id",
            IMAGE_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let inventory = sqlx::query_as::<_, InventoryRecord>(&format!(
            "SELECT {} FROM inventory ORDER BY product_id, store_id",
            RECORD_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let sales = sqlx::query_as::<_, Sale>(&format!("SELECT {} FROM sales ORDER BY id", SALE_COLUMNS))
            .fetch_all(&mut *tx)
            .await?;

        let sale_items = sqlx::query_as::<_, SaleLineItem>(&format!(
            "SELECT {} FROM sale_items ORDER BY sale_id, id",
            ITEM_COLUMNS
        ))
        .fetch_all(&mut *tx)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let snapshot = BackupSnapshot {
            metadata: BackupMetadata {
                created_at: Utc::now(),
                version: BACKUP_FORMAT_VERSION,
                app_version: env!("CARGO_PKG_VERSION"),
                backup_type: "full_system",
            },
            data: BackupData {
                categories,
                stores,
                products,
                product_images,
                inventory,
                sales,
                sale_items,
                users,
            },
        };

        tracing::info!(
            products = snapshot.data.products.len(),
            sales = snapshot.data.sales.len(),
            "Backup snapshot taken"
        );
        Ok(snapshot)
    }

    /// Settings safe to show any administrator; no secrets or connection strings
    pub async fn system_config(&self, config: &Config) -> AppResult<SystemConfigView> {
        let database_stats = sqlx::query_as::<_, DatabaseStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products) AS total_products,
                (SELECT COUNT(*) FROM categories) AS total_categories,
                (SELECT COUNT(*) FROM stores) AS total_stores,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM sales) AS total_sales,
                (SELECT COUNT(*) FROM inventory) AS total_inventory_records
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(SystemConfigView {
            version: env!("CARGO_PKG_VERSION"),
            environment: config.environment.clone(),
            database_stats,
            import_defaults: ImportDefaults {
                store_name: config.import.default_store_name.clone(),
                store_code: config.import.default_store_code.clone(),
                category_name: config.import.default_category_name.clone(),
                min_stock: config.import.default_min_stock,
            },
            session: SessionSettings {
                access_token_expiry_secs: config.auth.access_token_expiry,
                refresh_token_expiry_secs: config.auth.refresh_token_expiry,
                cookie_name: config.auth.cookie_name.clone(),
            },
        })
    }
}

/// Attachment file name for a snapshot
pub fn backup_filename(created_at: DateTime<Utc>) -> String {
    format!("inventory-backup-{}.json", created_at.format("%Y%m%d_%H%M%S"))
}
