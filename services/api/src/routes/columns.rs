//! Column and column option endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, put},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        PositionUpdate,
        column::{ColumnNameQuery, NewColumn, NewColumnOptions, UpdateColumn, UpdateColumnOption},
    },
    state::AppState,
};

/// `DELETE /columns/:column_id?force=true` drops a column that still has data
#[derive(Debug, Default, Deserialize)]
struct DeleteColumnQuery {
    #[serde(default)]
    force: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/columns", get(list_columns).post(create_column))
        .route("/columns/table/:table_id", get(list_columns_by_table))
        .route("/columns/table/:table_id/with-options", get(list_columns_with_options))
        .route("/columns/table/:table_id/exists-name", get(exists_column_name))
        .route(
            "/columns/:column_id",
            get(get_column).put(update_column).delete(delete_column),
        )
        .route("/columns/:column_id/has-records", get(column_has_records))
        .route("/columns/:column_id/update_cols", patch(update_column_position))
        .route(
            "/columns/:column_id/options",
            get(list_options).post(create_options).delete(delete_all_options),
        )
        .route("/columns/:column_id/available-options", get(available_options))
        .route("/options/:option_id", put(update_option).delete(delete_option))
}

async fn list_columns(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.column_repository.list().await?))
}

async fn list_columns_by_table(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.column_repository.list_by_table(table_id).await?))
}

async fn list_columns_with_options(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .column_repository
            .list_by_table_with_options(table_id)
            .await?,
    ))
}

async fn exists_column_name(
    State(state): State<AppState>,
    Path(table_id): Path<i32>,
    Query(query): Query<ColumnNameQuery>,
) -> ApiResult<impl IntoResponse> {
    let exists = state
        .column_repository
        .exists_name(table_id, &query.name, query.exclude_column_id)
        .await?;

    Ok(Json(json!({ "exists": exists })))
}

async fn get_column(
    State(state): State<AppState>,
    Path(column_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let column = state
        .column_repository
        .find_by_id(column_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Column"))?;

    Ok(Json(column))
}

async fn create_column(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewColumn>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let column = state.column_repository.create(&payload).await?;

    Ok((StatusCode::CREATED, Json(column)))
}

async fn update_column(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<i32>,
    Json(payload): Json<UpdateColumn>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.column_repository.update(column_id, &payload).await?))
}

async fn delete_column(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<i32>,
    Query(query): Query<DeleteColumnQuery>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !query.force && state.column_repository.has_records(column_id).await? {
        return Err(ApiError::Conflict(
            "Column has data in existing records; pass force=true to delete it".to_string(),
        ));
    }

    if !state.column_repository.delete(column_id).await? {
        return Err(ApiError::not_found("Column"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn column_has_records(
    State(state): State<AppState>,
    Path(column_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let has_records = state.column_repository.has_records(column_id).await?;
    Ok(Json(json!({ "has_records": has_records })))
}

async fn update_column_position(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<i32>,
    Json(payload): Json<PositionUpdate>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let column = state
        .column_repository
        .update_position(column_id, payload.position)
        .await?;

    Ok(Json(column))
}

async fn list_options(
    State(state): State<AppState>,
    Path(column_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.column_option_repository.list(column_id).await?))
}

async fn create_options(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<i32>,
    Json(payload): Json<NewColumnOptions>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let options = state
        .column_option_repository
        .create_many(column_id, &payload.options)
        .await?;

    Ok((StatusCode::CREATED, Json(options)))
}

async fn delete_all_options(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let deleted = state.column_option_repository.delete_all(column_id).await?;

    Ok(Json(json!({ "deleted": deleted })))
}

async fn available_options(
    State(state): State<AppState>,
    Path(column_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .column_option_repository
            .available_options(column_id)
            .await?,
    ))
}

async fn update_option(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(option_id): Path<i32>,
    Json(payload): Json<UpdateColumnOption>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let option = state
        .column_option_repository
        .update(option_id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Option"))?;

    Ok(Json(option))
}

async fn delete_option(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(option_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !state.column_option_repository.delete(option_id).await? {
        return Err(ApiError::not_found("Option"));
    }

    Ok(StatusCode::NO_CONTENT)
}
