//! User administration endpoints

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
    models::user::{BlockRequest, NewUser, UpdateUser},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:user_id/block", patch(block_user))
        .route("/users/:user_id/activate", patch(activate_user))
        .route("/users/:user_id/deactivate", patch(deactivate_user))
        .route("/users/:user_id/roles", get(user_roles))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.user_repository.list().await?))
}

/// Admins see everyone; other users only themselves
async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    if user.id != user_id {
        user.require_admin()?;
    }
    let found = state
        .user_repository
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(found))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    let created = state.user_repository.create(&payload).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateUser>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    Ok(Json(state.user_repository.update(user_id, &payload).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if user.id == user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }
    if !state.user_repository.delete(user_id).await? {
        return Err(ApiError::not_found("User"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn block_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(payload): Json<BlockRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let updated = state
        .user_repository
        .set_blocked(user_id, payload.blocked)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(updated))
}

async fn activate_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let updated = state
        .user_repository
        .set_active(user_id, true)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(updated))
}

async fn deactivate_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let updated = state
        .user_repository
        .set_active(user_id, false)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(updated))
}

async fn user_roles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    if user.id != user_id {
        user.require_admin()?;
    }
    Ok(Json(state.user_repository.roles(user_id).await?))
}
