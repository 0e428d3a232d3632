//! Logical table endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        PositionUpdate,
        table::{JoinTableRequest, NewTable, TableNameQuery, UpdateTable, ValidateUniqueQuery},
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tables", get(list_tables).post(create_table))
        .route("/tables/module/:module_id", get(list_tables_by_module))
        .route("/tables/exists/name", get(exists_table_name))
        .route("/tables/join", post(get_or_create_join_table))
        .route(
            "/tables/:table_id",
            get(get_table).put(update_table).delete(delete_table),
        )
        .route("/tables/:table_id/update_tables", patch(update_table_position))
        .route("/tables/:table_id/validate-unique", get(validate_unique))
}

async fn list_tables(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.table_repository.list().await?))
}

async fn list_tables_by_module(
    State(state): State<AppState>,
    Path(module_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.table_repository.list_by_module(module_id).await?))
}

async fn get_table(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let table = state
        .table_repository
        .find_by_id(table_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table"))?;

    Ok(Json(table))
}

async fn create_table(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewTable>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let table = state.table_repository.create(&payload).await?;

    Ok((StatusCode::CREATED, Json(table)))
}

async fn update_table(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
    Json(payload): Json<UpdateTable>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.table_repository.update(table_id, &payload).await?))
}

async fn delete_table(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !state.table_repository.delete(table_id).await? {
        return Err(ApiError::not_found("Table"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn exists_table_name(
    State(state): State<AppState>,
    Query(query): Query<TableNameQuery>,
) -> ApiResult<impl IntoResponse> {
    let exists = state
        .table_repository
        .exists_name(query.module_id, &query.name, query.exclude_table_id)
        .await?;

    Ok(Json(json!({ "exists": exists })))
}

async fn get_or_create_join_table(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<JoinTableRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let response = state
        .table_repository
        .get_or_create_join_table(
            payload.original_table_id,
            payload.foreign_table_id,
            payload.column_name.as_deref(),
        )
        .await?;

    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

async fn update_table_position(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
    Json(payload): Json<PositionUpdate>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let table = state
        .table_repository
        .update_position(table_id, payload.position)
        .await?;

    Ok(Json(table))
}

async fn validate_unique(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
    Query(query): Query<ValidateUniqueQuery>,
) -> ApiResult<impl IntoResponse> {
    let is_unique = state
        .table_repository
        .validate_unique(table_id, &query.column, &query.value, query.exclude_record_id)
        .await?;

    Ok(Json(json!({ "is_unique": is_unique })))
}
