//! Role endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::role::{NewRole, RoleListQuery, RoleUsersRequest, UpdateRole},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/:role_id",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route(
            "/roles/:role_id/users",
            get(role_users).post(assign_users).delete(remove_users),
        )
}

async fn list_roles(
    State(state): State<AppState>,
    Query(query): Query<RoleListQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.role_repository.list(query.include_inactive).await?))
}

async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let role = state
        .role_repository
        .find_by_id(role_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Role"))?;

    Ok(Json(role))
}

async fn create_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewRole>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let role = state.role_repository.create(&payload).await?;

    Ok((StatusCode::CREATED, Json(role)))
}

async fn update_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(role_id): Path<i32>,
    Json(payload): Json<UpdateRole>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.role_repository.update(role_id, &payload).await?))
}

async fn delete_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(role_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !state.role_repository.deactivate(role_id).await? {
        return Err(ApiError::not_found("Role"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn role_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(role_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.role_repository.users(role_id).await?))
}

async fn assign_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(role_id): Path<i32>,
    Json(payload): Json<RoleUsersRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let assigned = state
        .role_repository
        .assign_users(role_id, &payload.user_ids)
        .await?;

    Ok(Json(json!({ "assigned": assigned })))
}

async fn remove_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(role_id): Path<i32>,
    Json(payload): Json<RoleUsersRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let removed = state
        .role_repository
        .remove_users(role_id, &payload.user_ids)
        .await?;

    Ok(Json(json!({ "removed": removed })))
}
