//! API service routes
//!
//! Everything under `/api` requires a valid session. Reading metadata is
//! open to every signed-in user; changing it requires an admin role. Record
//! endpoints check the caller's effective permission on the table.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tracing::error;

use crate::{
    error::{ApiError, ApiResult},
    metadata::Action,
    middleware::{AuthUser, auth_middleware},
    state::AppState,
};

mod collaborators;
mod columns;
mod modules;
mod notifications;
mod permissions;
mod records;
mod roles;
mod tables;
mod users;
mod views;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(modules::routes())
        .merge(tables::routes())
        .merge(collaborators::routes())
        .merge(columns::routes())
        .merge(permissions::routes())
        .merge(records::routes())
        .merge(roles::routes())
        .merge(users::routes())
        .merge(notifications::routes())
        .merge(views::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match common::database::health_check(&state.db_pool).await {
        Ok(ok) => ok,
        Err(e) => {
            error!("Database health check failed: {}", e);
            false
        }
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "service": "api-service",
            "database": database,
        })),
    )
}

/// Allow `action` on a table for admins, for holders of a granting role,
/// and, for reads and updates, for active collaborators of the table.
pub(crate) async fn require_table_access(
    state: &AppState,
    user: &AuthUser,
    table_id: i32,
    action: Action,
) -> ApiResult<()> {
    if user.is_admin {
        return Ok(());
    }

    let flags = state
        .permission_repository
        .user_permissions(user.id, table_id)
        .await?;
    if flags.allows(action) {
        return Ok(());
    }

    if matches!(action, Action::Read | Action::Update)
        && state
            .collaborator_repository
            .is_collaborator(table_id, user.id)
            .await?
    {
        return Ok(());
    }

    Err(ApiError::forbidden(format!(
        "No {} permission on table {}",
        action.as_str(),
        table_id
    )))
}
