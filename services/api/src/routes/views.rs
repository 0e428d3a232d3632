//! Saved view endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use crate::{
    error::{ApiError, ApiResult},
    metadata::Action,
    middleware::AuthUser,
    models::view::{NewView, ReplaceSorts, ViewWithSorts},
    routes::require_table_access,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/views", post(create_view))
        .route("/views/table/:table_id", get(list_views))
        .route("/views/:view_id", get(get_view).delete(delete_view))
        .route("/views/:view_id/sorts", put(replace_sorts))
}

async fn view_with_access(
    state: &AppState,
    user: &AuthUser,
    view_id: i32,
) -> ApiResult<ViewWithSorts> {
    let view = state
        .view_repository
        .find_by_id(view_id)
        .await?
        .ok_or_else(|| ApiError::not_found("View"))?;
    require_table_access(state, user, view.view.table_id, Action::Read).await?;

    Ok(view)
}

async fn list_views(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    require_table_access(&state, &user, table_id, Action::Read).await?;
    Ok(Json(state.view_repository.list_by_table(table_id).await?))
}

async fn get_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(view_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(view_with_access(&state, &user, view_id).await?))
}

async fn create_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewView>,
) -> ApiResult<impl IntoResponse> {
    require_table_access(&state, &user, payload.table_id, Action::Read).await?;
    let view = state.view_repository.create(&payload, user.id).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

async fn replace_sorts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(view_id): Path<i32>,
    Json(payload): Json<ReplaceSorts>,
) -> ApiResult<impl IntoResponse> {
    view_with_access(&state, &user, view_id).await?;
    let view = state
        .view_repository
        .replace_sorts(view_id, &payload.sorts)
        .await?;

    Ok(Json(view))
}

async fn delete_view(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(view_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    view_with_access(&state, &user, view_id).await?;
    state.view_repository.delete(view_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
