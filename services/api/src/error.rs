//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::metadata::MetadataError;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, invalid, expired or revoked token
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name or row already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            MetadataError::Conflict(msg) => ApiError::Conflict(msg),
            MetadataError::Invalid(msg) => ApiError::BadRequest(msg),
        }
    }
}

/// Repositories return `anyhow`; engine errors keep their status, unique
/// violations become 409 and everything else is logged and hidden.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(meta) = err.downcast_ref::<MetadataError>() {
            return meta.clone().into();
        }

        let unique_violation = match err.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => err
                .downcast_ref::<DatabaseError>()
                .is_some_and(DatabaseError::is_unique_violation),
        };
        if unique_violation {
            return ApiError::Conflict("A row with the same unique value already exists".to_string());
        }

        error!("Unhandled error: {:#}", err);
        ApiError::InternalServerError
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_metadata_errors_keep_their_status() {
        let not_found: ApiError = anyhow::Error::new(MetadataError::not_found("Column")).into();
        assert!(matches!(&not_found, ApiError::NotFound(msg) if msg == "Column not found"));
        assert_eq!(status_of(not_found), StatusCode::NOT_FOUND);

        let conflict: ApiError = anyhow::Error::new(MetadataError::conflict("taken")).into();
        assert_eq!(status_of(conflict), StatusCode::CONFLICT);

        let invalid: ApiError = anyhow::Error::new(MetadataError::invalid("bad")).into();
        assert_eq!(status_of(invalid), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_errors_are_hidden() {
        let err: ApiError = anyhow::anyhow!("relation \"secret\" does not exist").into();
        assert!(matches!(err, ApiError::InternalServerError));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_statuses() {
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ApiError::forbidden("Account is blocked")),
            StatusCode::FORBIDDEN
        );
    }
}
