//! Table collaborator endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use crate::{
    error::{ApiError, ApiResult},
    metadata::Action,
    middleware::AuthUser,
    models::collaborator::AssignCollaborators,
    routes::require_table_access,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tables/:table_id/collaborators",
            get(list_collaborators).post(assign_collaborators),
        )
        .route(
            "/tables/:table_id/collaborators/:user_id",
            delete(remove_collaborator),
        )
}

async fn list_collaborators(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    require_table_access(&state, &user, table_id, Action::Read).await?;
    Ok(Json(state.collaborator_repository.list_by_table(table_id).await?))
}

async fn assign_collaborators(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
    Json(payload): Json<AssignCollaborators>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    let collaborators = state
        .collaborator_repository
        .assign(table_id, &payload.user_ids, payload.notes.as_deref(), user.id)
        .await?;

    Ok(Json(collaborators))
}

async fn remove_collaborator(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((table_id, user_id)): Path<(i32, i32)>,
) -> ApiResult<impl IntoResponse> {
    user.require_admin()?;
    if !state.collaborator_repository.remove(table_id, user_id).await? {
        return Err(ApiError::not_found("Collaborator"));
    }

    Ok(StatusCode::NO_CONTENT)
}
