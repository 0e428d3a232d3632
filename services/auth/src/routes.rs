//! Authentication service routes

use api::{
    middleware::{TOKEN_COOKIE, extract_token},
    models::user::{NewUser, User},
    repositories::users::verify_password,
};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    AppState,
    validation::{validate_email, validate_name, validate_password},
};

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request for self-registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// `Set-Cookie` value carrying the session token
pub fn session_cookie(token: &str, max_age: u64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=None; Path=/; Max-Age={}",
        TOKEN_COOKIE, token, max_age
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn cleared_cookie() -> String {
    session_cookie("", 0)
}

fn with_cookie(cookie: String) -> Result<HeaderMap, AuthError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&cookie).map_err(|e| {
        error!("Invalid cookie value: {}", e);
        AuthError::InternalServerError
    })?;
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);
    let redis = state.redis_pool.health_check().await.unwrap_or(false);

    let status = if database && redis {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "auth-service",
            "database": database,
            "redis": redis,
        })),
    )
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let key = payload.email.trim().to_lowercase();
    info!("Login attempt for {}", key);

    if !state.rate_limiter.is_allowed(&key).await {
        return Err(AuthError::TooManyRequests(
            state.rate_limiter.config().ban_duration_seconds,
        ));
    }

    let user = state.user_repository.find_by_email(&key).await?;
    let verified = match &user {
        Some(user) => verify_password(&user.password_hash, &payload.password).unwrap_or_else(|e| {
            warn!("Unreadable password hash for user {}: {}", user.id, e);
            false
        }),
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            state.rate_limiter.record_failure(&key).await;
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !user.is_active {
        return Err(AuthError::Forbidden("Account is inactive"));
    }
    if user.is_blocked {
        return Err(AuthError::Forbidden("Account is blocked"));
    }

    state.rate_limiter.reset(&key).await;

    let token = state.jwt_service.generate_token(user.id, &user.email)?;
    let expires_in = state.jwt_service.expiry_seconds();
    let headers = with_cookie(session_cookie(&token, expires_in))?;

    info!(user_id = user.id, "User logged in");
    Ok((
        StatusCode::OK,
        headers,
        Json(json!({
            "user": user,
            "token": token,
            "expires_in": expires_in,
        })),
    ))
}

/// Logout endpoint
///
/// Revokes the presented token for the rest of its lifetime and clears the
/// cookie. Missing or already invalid tokens still get a cleared cookie.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    if let Some(token) = extract_token(&headers) {
        if let Ok(claims) = state.jwt_service.validate_token(&token) {
            let remaining = state.jwt_service.remaining_seconds(&claims)?;
            state
                .redis_pool
                .revoke_token(&token, remaining)
                .await
                .map_err(|e| {
                    error!("Failed to revoke token: {}", e);
                    AuthError::InternalServerError
                })?;
            info!(user_id = claims.sub, "User logged out");
        }
    }

    Ok((
        StatusCode::OK,
        with_cookie(cleared_cookie())?,
        Json(json!({ "message": "Logged out successfully" })),
    ))
}

/// Self-registration; new accounts start without roles
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    validate_name(&payload.name).map_err(AuthError::BadRequest)?;
    validate_email(payload.email.trim()).map_err(AuthError::BadRequest)?;
    validate_password(&payload.password).map_err(AuthError::BadRequest)?;

    if state
        .user_repository
        .find_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(AuthError::Conflict("Email is already registered"));
    }

    let user = state
        .user_repository
        .create(&NewUser {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            avatar_url: None,
            role_ids: Vec::new(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Current user, resolved from the session token
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let token = extract_token(&headers).ok_or(AuthError::Unauthorized)?;
    let claims = state
        .jwt_service
        .validate_token(&token)
        .map_err(|_| AuthError::Unauthorized)?;

    let revoked = state.redis_pool.is_token_revoked(&token).await.map_err(|e| {
        error!("Failed to check token revocation: {}", e);
        AuthError::InternalServerError
    })?;
    if revoked {
        return Err(AuthError::Unauthorized);
    }

    let user: User = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::Unauthorized)?;
    let roles = state.user_repository.roles(user.id).await?;
    let is_admin = roles.iter().any(|role| role.is_admin);

    Ok(Json(json!({
        "user": user,
        "roles": roles,
        "is_admin": is_admin,
    })))
}

/// Custom error type for authentication errors
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    InvalidCredentials,
    Forbidden(&'static str),
    BadRequest(String),
    Conflict(&'static str),
    /// Carries the ban length in seconds
    TooManyRequests(u64),
    InternalServerError,
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        error!("Unhandled error: {:#}", err);
        AuthError::InternalServerError
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            AuthError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string()),
            AuthError::TooManyRequests(seconds) => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("Too many login attempts, try again in {} seconds", seconds),
            ),
            AuthError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        assert_eq!(
            session_cookie("abc.def.ghi", 28800),
            "token=abc.def.ghi; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=28800"
        );
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = cleared_cookie();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.ends_with("Max-Age=0"));
        assert!(with_cookie(cookie).is_ok());
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            AuthError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden("Account is blocked").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::TooManyRequests(900).into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        let hidden: AuthError = anyhow::anyhow!("connection refused").into();
        assert_eq!(
            hidden.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
