//! Sales handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    CreateSaleInput, PaginatedResponse, Pagination, Permission, SaleFilter, SaleWithItems,
    TransitionInput,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::SaleService;
use crate::AppState;

pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<SaleWithItems>>> {
    current_user.require(Permission::View)?;
    let sales = SaleService::new(state.db).list_sales(&filter, &pagination).await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<i64>,
) -> AppResult<Json<SaleWithItems>> {
    current_user.require(Permission::View)?;
    let sale = SaleService::new(state.db).get_sale(sale_id).await?;
    Ok(Json(sale))
}

/// Record a sale; stock for every line is taken or nothing is
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleWithItems>)> {
    current_user.require(Permission::Create)?;
    let sale = SaleService::new(state.db)
        .create_sale(Some(current_user.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn transition_sale_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<i64>,
    Json(input): Json<TransitionInput>,
) -> AppResult<Json<SaleWithItems>> {
    current_user.require(Permission::Edit)?;
    let sale = SaleService::new(state.db)
        .transition_status(sale_id, input.status)
        .await?;
    Ok(Json(sale))
}
