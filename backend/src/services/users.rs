//! User management service

use shared::{CreateUserInput, PaginatedResponse, Pagination, UpdateUserInput, User, UserFilter};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::services::auth::hash_password;

/// Columns of [`User`]; the password hash is never selected with them
pub const USER_COLUMNS: &str =
    "id, username, name, email, phone, role, store_id, is_active, last_login, created_at, updated_at";

/// User service for account administration
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List users, filtered by role, active flag and name/username/email text
    pub async fn list_users(
        &self,
        filter: &UserFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<User>> {
        let search = filter.search.as_deref().map(|s| format!("%{}%", s.trim()));
        let where_clause = r#"
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::BOOLEAN IS NULL OR is_active = $2)
              AND ($3::TEXT IS NULL OR name ILIKE $3 OR username ILIKE $3 OR email ILIKE $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM users {}",
            where_clause
        ))
        .bind(filter.role)
        .bind(filter.is_active)
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users {} ORDER BY id LIMIT $4 OFFSET $5",
            USER_COLUMNS, where_clause
        ))
        .bind(filter.role)
        .bind(filter.is_active)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, pagination, total as u64))
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        input.check()?;
        self.ensure_store_exists(input.store_id).await?;

        let password_hash = hash_password(&input.password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, name, email, phone, password_hash, role, store_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.username.trim())
        .bind(input.name.trim())
        .bind(input.email.trim().to_lowercase())
        .bind(&input.phone)
        .bind(&password_hash)
        .bind(input.role)
        .bind(input.store_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Partial update; `actor_id` may not deactivate or demote itself
    pub async fn update_user(
        &self,
        actor_id: i64,
        user_id: i64,
        input: UpdateUserInput,
    ) -> AppResult<User> {
        input.check()?;
        let existing = self.get_user(user_id).await?;
        if actor_id == user_id {
            if input.is_active == Some(false) {
                return Err(AppError::field("is_active", "You cannot deactivate your own account"));
            }
            if input.role.is_some_and(|r| r != existing.role) {
                return Err(AppError::field("role", "You cannot change your own role"));
            }
        }
        self.ensure_store_exists(input.store_id).await?;

        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                role = COALESCE($5, role),
                store_id = COALESCE($6, store_id),
                is_active = COALESCE($7, is_active),
                password_hash = COALESCE($8, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.email.as_deref().map(|e| e.trim().to_lowercase()))
        .bind(&input.phone)
        .bind(input.role)
        .bind(input.store_id)
        .bind(input.is_active)
        .bind(&password_hash)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            user_id,
            password_changed = password_hash.is_some(),
            "User updated"
        );
        Ok(user)
    }

    /// Soft delete; idempotent
    pub async fn deactivate_user(&self, actor_id: i64, user_id: i64) -> AppResult<User> {
        if actor_id == user_id {
            return Err(AppError::field("id", "You cannot deactivate your own account"));
        }
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

        tracing::info!(user_id, "User deactivated");
        Ok(user)
    }

    async fn ensure_store_exists(&self, store_id: Option<i64>) -> AppResult<()> {
        let Some(store_id) = store_id else {
            return Ok(());
        };
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM stores WHERE id = $1)")
            .bind(store_id)
            .fetch_one(&self.db)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::field("store_id", "Store does not exist"))
        }
    }
}
