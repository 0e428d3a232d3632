//! Permission matrix endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    metadata::PermissionFlags,
    middleware::AuthUser,
    models::permission::{AssignRolesPermissions, BulkRolePermissions, NewPermission},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/permissions", get(list_permissions).post(create_permission))
        .route(
            "/permissions/role/:role_id/table/:table_id",
            get(get_permission)
                .put(update_permission)
                .delete(delete_permission),
        )
        .route("/permissions/role/:role_id/bulk", post(bulk_update_role))
        .route("/permissions/table/:table_id/users", get(table_users))
        .route("/permissions/table/:table_id/roles", post(assign_to_roles))
        .route("/permissions/my-permissions", get(my_permissions))
        .route(
            "/permissions/my-permissions/table/:table_id",
            get(my_table_permissions),
        )
}

async fn list_permissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.permission_repository.list().await?))
}

async fn create_permission(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewPermission>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let permission = state.permission_repository.create(&payload).await?;

    Ok((StatusCode::CREATED, Json(permission)))
}

async fn get_permission(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((role_id, table_id)): Path<(i32, i32)>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let permission = state
        .permission_repository
        .find(role_id, table_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Permission"))?;

    Ok(Json(permission))
}

async fn update_permission(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((role_id, table_id)): Path<(i32, i32)>,
    Json(flags): Json<PermissionFlags>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let permission = state
        .permission_repository
        .upsert(role_id, table_id, flags)
        .await?;

    Ok(Json(permission))
}

async fn delete_permission(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((role_id, table_id)): Path<(i32, i32)>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !state.permission_repository.delete(role_id, table_id).await? {
        return Err(ApiError::not_found("Permission"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_update_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(role_id): Path<i32>,
    Json(payload): Json<BulkRolePermissions>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let written = state
        .permission_repository
        .bulk_update_role(role_id, &payload.permissions)
        .await?;

    Ok(Json(written))
}

async fn table_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.permission_repository.table_users(table_id).await?))
}

async fn assign_to_roles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
    Json(payload): Json<AssignRolesPermissions>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let written = state
        .permission_repository
        .assign_to_roles(table_id, &payload.role_ids, payload.flags)
        .await?;

    Ok(Json(written))
}

async fn my_permissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let tables = state
        .permission_repository
        .user_permissions_all_tables(user.id)
        .await?;

    Ok(Json(json!({ "is_admin": user.is_admin, "tables": tables })))
}

async fn my_table_permissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let flags = state
        .permission_repository
        .user_permissions(user.id, table_id)
        .await?;

    Ok(Json(json!({
        "table_id": table_id,
        "is_admin": user.is_admin,
        "permissions": flags,
    })))
}
