//! Product catalog handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    AddImageInput, CreateProductInput, PaginatedResponse, Pagination, Permission, Product,
    ProductDetail, ProductFilter, ProductImage, ProductStats, ProductStatus, UpdateProductInput,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ProductService;
use crate::AppState;

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    current_user.require(Permission::View)?;
    let products = ProductService::new(state.db)
        .list_products(&filter, &pagination)
        .await?;
    Ok(Json(products))
}

/// Product with per-store stock, margin and sales figures
pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ProductDetail>> {
    current_user.require(Permission::View)?;
    let detail = ProductService::new(state.db).get_product_detail(product_id).await?;
    Ok(Json(detail))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    current_user.require(Permission::Create)?;
    let product = ProductService::new(state.db).create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.require(Permission::Edit)?;
    if input.status == Some(ProductStatus::Inactive) {
        current_user.require(Permission::Delete)?;
    }
    let product = ProductService::new(state.db)
        .update_product(product_id, input)
        .await?;
    Ok(Json(product))
}

/// Soft delete
pub async fn deactivate_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Product>> {
    current_user.require(Permission::Delete)?;
    let product = ProductService::new(state.db).deactivate_product(product_id).await?;
    Ok(Json(product))
}

pub async fn get_product_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ProductStats>> {
    current_user.require(Permission::View)?;
    let stats = ProductService::new(state.db).product_stats().await?;
    Ok(Json(stats))
}

pub async fn list_product_images(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Vec<ProductImage>>> {
    current_user.require(Permission::View)?;
    let images = ProductService::new(state.db).list_images(product_id).await?;
    Ok(Json(images))
}

pub async fn add_product_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
    Json(input): Json<AddImageInput>,
) -> AppResult<(StatusCode, Json<ProductImage>)> {
    current_user.require(Permission::Edit)?;
    let image = ProductService::new(state.db).add_image(product_id, input).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn set_primary_product_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((product_id, image_id)): Path<(i64, i64)>,
) -> AppResult<Json<Vec<ProductImage>>> {
    current_user.require(Permission::Edit)?;
    let images = ProductService::new(state.db)
        .set_primary_image(product_id, image_id)
        .await?;
    Ok(Json(images))
}

pub async fn remove_product_image(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((product_id, image_id)): Path<(i64, i64)>,
) -> AppResult<Json<Vec<ProductImage>>> {
    current_user.require(Permission::Edit)?;
    let images = ProductService::new(state.db)
        .remove_image(product_id, image_id)
        .await?;
    Ok(Json(images))
}
