//! User administration handlers; every operation needs the admin permission

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    role_catalog, CreateUserInput, PaginatedResponse, Pagination, Permission, RoleInfo,
    UpdateUserInput, User, UserFilter,
};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::UserService;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<UserFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    current_user.require(Permission::Admin)?;
    let users = UserService::new(state.db).list_users(&filter, &pagination).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<User>> {
    current_user.require(Permission::Admin)?;
    let user = UserService::new(state.db).get_user(user_id).await?;
    Ok(Json(user))
}

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    current_user.require(Permission::Admin)?;
    let user = UserService::new(state.db).create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Partial update, including password reset
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<i64>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    current_user.require(Permission::Admin)?;
    let user = UserService::new(state.db)
        .update_user(current_user.user_id, user_id, input)
        .await?;
    Ok(Json(user))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<User>> {
    current_user.require(Permission::Admin)?;
    let user = UserService::new(state.db)
        .deactivate_user(current_user.user_id, user_id)
        .await?;
    Ok(Json(user))
}

/// Roles with their permission sets
pub async fn list_roles(current_user: CurrentUser) -> AppResult<Json<Vec<RoleInfo>>> {
    current_user.require(Permission::View)?;
    Ok(Json(role_catalog()))
}
