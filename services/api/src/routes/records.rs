//! Record, record comment and assigned user endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};

use crate::{
    error::{ApiError, ApiResult},
    metadata::Action,
    middleware::AuthUser,
    models::{
        comment::{AssignUsers, CommentBody},
        record::{NewRecord, Record, UpdateRecord},
    },
    routes::require_table_access,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/records", post(create_record))
        .route("/records/table/:table_id", get(list_records))
        .route(
            "/records/:record_id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route(
            "/records/:record_id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/:comment_id", put(update_comment).delete(delete_comment))
        .route(
            "/records/:record_id/assigned-users",
            get(list_assigned_users).post(assign_users),
        )
        .route(
            "/records/:record_id/assigned-users/:user_id",
            delete(unassign_user),
        )
}

/// Load a record and check `action` on its table
async fn record_with_access(
    state: &AppState,
    user: &AuthUser,
    record_id: i32,
    action: Action,
) -> ApiResult<Record> {
    let record = state
        .record_repository
        .find_by_id(record_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Record"))?;
    require_table_access(state, user, record.table_id, action).await?;

    Ok(record)
}

async fn list_records(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    require_table_access(&state, &user, table_id, Action::Read).await?;
    Ok(Json(state.record_repository.list_by_table(table_id).await?))
}

async fn get_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let record = record_with_access(&state, &user, record_id, Action::Read).await?;
    Ok(Json(record))
}

async fn create_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewRecord>,
) -> ApiResult<impl IntoResponse> {
    require_table_access(&state, &user, payload.table_id, Action::Create).await?;
    let record = state.record_repository.create(&payload, user.id).await?;

    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
    Json(payload): Json<UpdateRecord>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Update).await?;
    Ok(Json(state.record_repository.update(record_id, &payload).await?))
}

async fn delete_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Delete).await?;
    state.record_repository.delete(record_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Read).await?;
    Ok(Json(state.comment_repository.list(record_id).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
    Json(payload): Json<CommentBody>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Read).await?;
    let comment = state
        .comment_repository
        .create(record_id, user.id, &payload.comment)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<i32>,
    Json(payload): Json<CommentBody>,
) -> ApiResult<impl IntoResponse> {
    let comment = state
        .comment_repository
        .update(comment_id, user.id, &payload.comment)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .comment_repository
        .delete(comment_id, user.id, user.is_admin)
        .await?
    {
        return Err(ApiError::not_found("Comment"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn list_assigned_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Read).await?;
    Ok(Json(state.comment_repository.assigned_users(record_id).await?))
}

async fn assign_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<i32>,
    Json(payload): Json<AssignUsers>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Update).await?;
    let assigned = state
        .comment_repository
        .assign_users(record_id, &payload.user_ids, user.id)
        .await?;

    Ok(Json(assigned))
}

async fn unassign_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((record_id, user_id)): Path<(i32, i32)>,
) -> ApiResult<impl IntoResponse> {
    record_with_access(&state, &user, record_id, Action::Update).await?;
    if !state
        .comment_repository
        .unassign_user(record_id, user_id)
        .await?
    {
        return Err(ApiError::not_found("Assignment"));
    }

    Ok(StatusCode::NO_CONTENT)
}
