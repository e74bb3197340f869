//! Inventory ledger handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{AdjustStockInput, LowStockItem, Permission, SetStockInput, StockLevel};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::InventoryService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub store_id: Option<i64>,
}

pub async fn get_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((product_id, store_id)): Path<(i64, i64)>,
) -> AppResult<Json<StockLevel>> {
    current_user.require(Permission::View)?;
    let level = InventoryService::new(state.db).get_stock(product_id, store_id).await?;
    Ok(Json(level))
}

/// Relative change; rejected with INSUFFICIENT_STOCK when it would go negative
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((product_id, store_id)): Path<(i64, i64)>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<StockLevel>> {
    current_user.require(Permission::Edit)?;
    let level = InventoryService::new(state.db)
        .adjust_stock(product_id, store_id, input)
        .await?;
    Ok(Json(level))
}

/// Absolute set
pub async fn set_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((product_id, store_id)): Path<(i64, i64)>,
    Json(input): Json<SetStockInput>,
) -> AppResult<Json<StockLevel>> {
    current_user.require(Permission::Edit)?;
    let level = InventoryService::new(state.db)
        .set_stock(product_id, store_id, input)
        .await?;
    Ok(Json(level))
}

pub async fn low_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<Vec<LowStockItem>>> {
    current_user.require(Permission::View)?;
    let items = InventoryService::new(state.db).low_stock_report(query.store_id).await?;
    Ok(Json(items))
}
