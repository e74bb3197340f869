//! Store handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    CreateStoreInput, PaginatedResponse, Pagination, Permission, Store, StoreFilter,
    StoreWithStats, UpdateStoreInput,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stores::StoreProduct;
use crate::services::StoreService;
use crate::AppState;

pub async fn list_stores(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<StoreFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Store>>> {
    current_user.require(Permission::View)?;
    let stores = StoreService::new(state.db).list_stores(&filter, &pagination).await?;
    Ok(Json(stores))
}

pub async fn get_store(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(store_id): Path<i64>,
) -> AppResult<Json<StoreWithStats>> {
    current_user.require(Permission::View)?;
    let store = StoreService::new(state.db).get_store(store_id).await?;
    Ok(Json(store))
}

/// Products stocked at a store
pub async fn list_store_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(store_id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<StoreProduct>>> {
    current_user.require(Permission::View)?;
    let products = StoreService::new(state.db)
        .store_products(store_id, &pagination)
        .await?;
    Ok(Json(products))
}

pub async fn create_store(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateStoreInput>,
) -> AppResult<(StatusCode, Json<Store>)> {
    current_user.require(Permission::Create)?;
    let store = StoreService::new(state.db).create_store(input).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

pub async fn update_store(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(store_id): Path<i64>,
    Json(input): Json<UpdateStoreInput>,
) -> AppResult<Json<Store>> {
    current_user.require(Permission::Edit)?;
    if input.is_active == Some(false) {
        current_user.require(Permission::Delete)?;
    }
    let store = StoreService::new(state.db).update_store(store_id, input).await?;
    Ok(Json(store))
}

pub async fn deactivate_store(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(store_id): Path<i64>,
) -> AppResult<Json<Store>> {
    current_user.require(Permission::Delete)?;
    let store = StoreService::new(state.db).deactivate_store(store_id).await?;
    Ok(Json(store))
}
