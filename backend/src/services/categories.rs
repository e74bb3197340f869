//! Category service: the category tree, its derived figures and cascading deactivation

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    Category, CategoryTree, CategoryWithStats, CreateCategoryInput, UpdateCategoryInput,
    DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON, UNCATEGORIZED,
};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::error::{AppError, AppResult};

pub const CATEGORY_COLUMNS: &str =
    "id, name, description, icon, color, parent_id, sort_order, is_active, created_at, updated_at";

/// Category service
#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

/// Result of deactivating a category subtree
#[derive(Debug, Clone, Serialize)]
pub struct DeactivationSummary {
    pub deactivated_category_ids: Vec<i64>,
    pub reassigned_products: u64,
    /// Category that received the products; `None` when there were none to move
    pub uncategorized_id: Option<i64>,
}

/// Row for stats query
#[derive(sqlx::FromRow)]
struct CategoryStatsRow {
    #[sqlx(flatten)]
    category: Category,
    product_count: i64,
    total_stock: i64,
    low_stock_items: i64,
    total_revenue: Decimal,
}

impl From<CategoryStatsRow> for CategoryWithStats {
    fn from(row: CategoryStatsRow) -> Self {
        CategoryWithStats {
            category: row.category,
            product_count: row.product_count,
            total_stock: row.total_stock,
            low_stock_items: row.low_stock_items,
            total_revenue: row.total_revenue,
        }
    }
}

/// Derived per-category figures; counts cover products directly in the category
const STATS_QUERY: &str = r#"
    SELECT c.id, c.name, c.description, c.icon, c.color, c.parent_id, c.sort_order,
           c.is_active, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM products p
             WHERE p.category_id = c.id AND p.status = 'active') AS product_count,
           COALESCE((SELECT SUM(i.quantity) FROM inventory i
                       JOIN products p ON p.id = i.product_id
                      WHERE p.category_id = c.id), 0)::BIGINT AS total_stock,
           (SELECT COUNT(*) FROM inventory i
              JOIN products p ON p.id = i.product_id
             WHERE p.category_id = c.id AND p.status = 'active'
               AND i.quantity <= i.min_stock) AS low_stock_items,
           COALESCE((SELECT SUM(si.quantity * si.unit_price) FROM sale_items si
                       JOIN sales s ON s.id = si.sale_id
                       JOIN products p ON p.id = si.product_id
                      WHERE p.category_id = c.id AND s.status <> 'refunded'), 0) AS total_revenue
    FROM categories c
"#;

impl CategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All categories with derived figures, ordered by sort order then name
    pub async fn list_categories(&self, include_inactive: bool) -> AppResult<Vec<CategoryWithStats>> {
        let rows = sqlx::query_as::<_, CategoryStatsRow>(&format!(
            "{} WHERE ($1 OR c.is_active) ORDER BY c.sort_order, c.name, c.id",
            STATS_QUERY
        ))
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_category(&self, category_id: i64) -> AppResult<CategoryWithStats> {
        sqlx::query_as::<_, CategoryStatsRow>(&format!("{} WHERE c.id = $1", STATS_QUERY))
            .bind(category_id)
            .fetch_optional(&self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::not_found("Category"))
    }

    /// Plain category record
    pub async fn find(&self, category_id: i64) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
    }

    /// Parent links of every category
    pub async fn tree(&self) -> AppResult<CategoryTree> {
        load_tree(&self.db).await
    }

    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        input.check()?;
        if let Some(parent_id) = input.parent_id {
            ensure_active_parent(&self.db, parent_id).await?;
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (name, description, icon, color, parent_id, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.icon.as_deref().unwrap_or(DEFAULT_CATEGORY_ICON))
        .bind(input.color.as_deref().unwrap_or(DEFAULT_CATEGORY_COLOR))
        .bind(input.parent_id)
        .bind(input.sort_order.unwrap_or(0))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Partial update. Re-parenting under itself or a descendant is rejected;
    /// `is_active: false` cascades like [`Self::deactivate_category`].
    pub async fn update_category(
        &self,
        category_id: i64,
        input: UpdateCategoryInput,
    ) -> AppResult<Category> {
        input.check()?;
        self.find(category_id).await?;

        let mut tx = self.db.begin().await?;
        let parent_id = match input.parent_id {
            Some(Some(new_parent)) => {
                // re-parents are serialized so two moves cannot close a loop
                sqlx::query("SELECT pg_advisory_xact_lock(hashtext('stockroom.category_tree'))")
                    .execute(&mut *tx)
                    .await?;
                let tree = load_tree(&mut *tx).await?;
                if tree.would_create_cycle(category_id, new_parent) {
                    return Err(AppError::field(
                        "parent_id",
                        "A category cannot be moved under itself or one of its descendants",
                    ));
                }
                ensure_active_parent(&mut *tx, new_parent).await?;
                Some(new_parent)
            }
            Some(None) | None => None,
        };

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                icon = COALESCE($4, icon),
                color = COALESCE($5, color),
                parent_id = CASE WHEN $9 THEN $6 ELSE parent_id END,
                sort_order = COALESCE($7, sort_order),
                is_active = CASE WHEN $8 THEN TRUE ELSE is_active END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(&input.icon)
        .bind(&input.color)
        .bind(parent_id)
        .bind(input.sort_order)
        .bind(input.is_active == Some(true))
        .bind(input.parent_id.is_some())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        if input.is_active == Some(false) && category.is_active {
            self.deactivate_category(category_id).await?;
            return self.find(category_id).await;
        }

        tracing::info!(category_id, "Category updated");
        Ok(category)
    }

    /// Deactivate a category and its whole subtree, moving their products to
    /// the `Uncategorized` category (created on demand). Idempotent.
    pub async fn deactivate_category(&self, category_id: i64) -> AppResult<DeactivationSummary> {
        let target = self.find(category_id).await?;
        if target.name == UNCATEGORIZED && target.parent_id.is_none() {
            return Err(AppError::field(
                "id",
                "The Uncategorized category receives orphaned products and cannot be deactivated",
            ));
        }

        let subtree = self.tree().await?.subtree(category_id);
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE categories SET is_active = FALSE, updated_at = NOW() WHERE id = ANY($1) AND is_active")
            .bind(&subtree)
            .execute(&mut *tx)
            .await?;

        let has_products = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE category_id = ANY($1))",
        )
        .bind(&subtree)
        .fetch_one(&mut *tx)
        .await?;

        let mut summary = DeactivationSummary {
            deactivated_category_ids: subtree.clone(),
            reassigned_products: 0,
            uncategorized_id: None,
        };

        if has_products {
            let uncategorized = uncategorized_category(&mut *tx, &subtree).await?;
            let moved = sqlx::query(
                "UPDATE products SET category_id = $1, updated_at = NOW() WHERE category_id = ANY($2)",
            )
            .bind(uncategorized)
            .bind(&subtree)
            .execute(&mut *tx)
            .await?;
            summary.reassigned_products = moved.rows_affected();
            summary.uncategorized_id = Some(uncategorized);
        }

        tx.commit().await?;

        tracing::info!(
            category_id,
            subtree_size = summary.deactivated_category_ids.len(),
            reassigned_products = summary.reassigned_products,
            "Category subtree deactivated"
        );
        Ok(summary)
    }
}

async fn load_tree<'e, E: PgExecutor<'e>>(executor: E) -> AppResult<CategoryTree> {
    let links = sqlx::query_as::<_, (i64, Option<i64>)>("SELECT id, parent_id FROM categories")
        .fetch_all(executor)
        .await?;
    Ok(CategoryTree::from_links(links))
}

async fn ensure_active_parent<'e, E: PgExecutor<'e>>(executor: E, parent_id: i64) -> AppResult<()> {
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM categories WHERE id = $1")
        .bind(parent_id)
        .fetch_optional(executor)
        .await?;
    match active {
        Some(true) => Ok(()),
        Some(false) => Err(AppError::field("parent_id", "Parent category is inactive")),
        None => Err(AppError::field("parent_id", "Parent category does not exist")),
    }
}

/// Active root `Uncategorized` category outside `excluded`, created if missing
pub(crate) async fn uncategorized_category(
    conn: &mut PgConnection,
    excluded: &[i64],
) -> AppResult<i64> {
    // serialize creation across concurrent deactivations
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext('stockroom.uncategorized'))")
        .execute(&mut *conn)
        .await?;

    let existing = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM categories
        WHERE name = $1 AND parent_id IS NULL AND NOT (id = ANY($2))
        ORDER BY is_active DESC, id
        LIMIT 1
        "#,
    )
    .bind(UNCATEGORIZED)
    .bind(excluded)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        sqlx::query("UPDATE categories SET is_active = TRUE WHERE id = $1 AND NOT is_active")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO categories (name, description, icon, color, sort_order)
        VALUES ($1, 'Products whose category was deactivated', $2, '#6B7280', 9999)
        RETURNING id
        "#,
    )
    .bind(UNCATEGORIZED)
    .bind(DEFAULT_CATEGORY_ICON)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(category_id = id, "Created Uncategorized category");
    Ok(id)
}
