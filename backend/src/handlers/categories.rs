//! Category handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Category, CategoryWithStats, CreateCategoryInput, Permission, UpdateCategoryInput};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::categories::DeactivationSummary;
use crate::services::CategoryService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<CategoryListQuery>,
) -> AppResult<Json<Vec<CategoryWithStats>>> {
    current_user.require(Permission::View)?;
    let categories = CategoryService::new(state.db)
        .list_categories(query.include_inactive)
        .await?;
    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<i64>,
) -> AppResult<Json<CategoryWithStats>> {
    current_user.require(Permission::View)?;
    let category = CategoryService::new(state.db).get_category(category_id).await?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    current_user.require(Permission::Create)?;
    let category = CategoryService::new(state.db).create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<i64>,
    Json(input): Json<UpdateCategoryInput>,
) -> AppResult<Json<Category>> {
    current_user.require(Permission::Edit)?;
    if input.is_active == Some(false) {
        current_user.require(Permission::Delete)?;
    }
    let category = CategoryService::new(state.db)
        .update_category(category_id, input)
        .await?;
    Ok(Json(category))
}

/// Deactivate the category subtree and re-home its products
pub async fn deactivate_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<i64>,
) -> AppResult<Json<DeactivationSummary>> {
    current_user.require(Permission::Delete)?;
    let summary = CategoryService::new(state.db)
        .deactivate_category(category_id)
        .await?;
    Ok(Json(summary))
}
