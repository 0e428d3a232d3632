//! Notification and scheduled notification endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::notification::{
        NewScheduledNotification, NotificationQuery, ScheduledNotification,
        UpdateScheduledNotification,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/:notification_id/read", patch(mark_read))
        .route("/notifications/:notification_id", delete(delete_notification))
        .route(
            "/scheduled-notifications",
            get(list_scheduled).post(create_scheduled),
        )
        .route(
            "/scheduled-notifications/:scheduled_id",
            get(get_scheduled).put(update_scheduled).delete(delete_scheduled),
        )
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<impl IntoResponse> {
    let notifications = state
        .notification_repository
        .list_for_user(user.id, query.unread_only, query.limit)
        .await?;

    Ok(Json(notifications))
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let count = state.notification_repository.unread_count(user.id).await?;
    Ok(Json(json!({ "count": count })))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.notification_repository.mark_all_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(notification_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .notification_repository
        .mark_read(notification_id, user.id)
        .await?
    {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(notification_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .notification_repository
        .delete(notification_id, user.id)
        .await?
    {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Load a schedule the caller owns; admins may touch anyone's
async fn owned_schedule(
    state: &AppState,
    user: &AuthUser,
    scheduled_id: i32,
) -> ApiResult<ScheduledNotification> {
    let scheduled = state
        .notification_repository
        .find_scheduled(scheduled_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Scheduled notification"))?;

    if scheduled.user_id != user.id {
        user.require_admin()?;
    }
    Ok(scheduled)
}

async fn list_scheduled(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.notification_repository.list_scheduled(user.id).await?))
}

async fn get_scheduled(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(scheduled_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(owned_schedule(&state, &user, scheduled_id).await?))
}

async fn create_scheduled(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewScheduledNotification>,
) -> ApiResult<impl IntoResponse> {
    let target = payload.user_id.unwrap_or(user.id);
    if target != user.id {
        user.require_admin()?;
    }
    let scheduled = state
        .notification_repository
        .create_scheduled(target, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(scheduled)))
}

async fn update_scheduled(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(scheduled_id): Path<i32>,
    Json(payload): Json<UpdateScheduledNotification>,
) -> ApiResult<impl IntoResponse> {
    owned_schedule(&state, &user, scheduled_id).await?;
    let scheduled = state
        .notification_repository
        .update_scheduled(scheduled_id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Scheduled notification"))?;

    Ok(Json(scheduled))
}

async fn delete_scheduled(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(scheduled_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    owned_schedule(&state, &user, scheduled_id).await?;
    state
        .notification_repository
        .delete_scheduled(scheduled_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
