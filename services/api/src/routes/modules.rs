//! Module endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        PositionUpdate,
        module::{NewModule, UpdateModule},
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/modules", get(list_modules).post(create_module))
        .route(
            "/modules/:module_id",
            get(get_module).put(update_module).delete(delete_module),
        )
        .route("/modules/:module_id/update_modules", patch(update_module_position))
}

async fn list_modules(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.module_repository.list().await?))
}

async fn get_module(
    State(state): State<AppState>,
    Path(module_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let module = state
        .module_repository
        .find_by_id(module_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Module"))?;

    Ok(Json(module))
}

async fn create_module(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewModule>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let module = state.module_repository.create(&payload, user.id).await?;

    Ok((StatusCode::CREATED, Json(module)))
}

async fn update_module(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<i32>,
    Json(payload): Json<UpdateModule>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.module_repository.update(module_id, &payload).await?))
}

async fn delete_module(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !state.module_repository.delete(module_id).await? {
        return Err(ApiError::not_found("Module"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn update_module_position(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<i32>,
    Json(payload): Json<PositionUpdate>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let module = state
        .module_repository
        .update_position(module_id, payload.position)
        .await?;

    Ok(Json(module))
}
