//! Authentication middleware for JWT token validation

use axum::{
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};

use crate::{error::ApiError, state::AppState};

/// Name of the httpOnly cookie carrying the session token
pub const TOKEN_COOKIE: &str = "token";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User ID
    pub sub: i32,
    pub email: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator role required"))
        }
    }
}

/// Read a PEM key from an environment variable holding either the PEM text
/// or a path to it (tried from the working directory, then the crate root).
pub fn read_pem_from_env(var: &str) -> anyhow::Result<String> {
    let value = env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let pem = std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read key file for {}: {}", var, e))?;

    Ok(pem.trim().to_string())
}

/// Verifies RS256 tokens with the public key
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_public_key(public_key: &str) -> anyhow::Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())?;
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;

        Ok(JwtVerifier {
            decoding_key,
            validation,
        })
    }

    /// Build from `JWT_PUBLIC_KEY`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_public_key(&read_pem_from_env("JWT_PUBLIC_KEY")?)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

/// Token from the `token` cookie, falling back to `Authorization: Bearer`
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Authentication middleware
///
/// Rejects missing, invalid, expired and revoked tokens with 401 and
/// inactive or blocked accounts with 403, then attaches an [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers()).ok_or(ApiError::Unauthorized)?;

    let claims = state.jwt_verifier.verify(&token).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized
    })?;

    let revoked = state.redis_pool.is_token_revoked(&token).await.map_err(|e| {
        error!("Failed to check token revocation: {}", e);
        ApiError::InternalServerError
    })?;
    if revoked {
        return Err(ApiError::Unauthorized);
    }

    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !user.is_active {
        return Err(ApiError::forbidden("Account is inactive"));
    }
    if user.is_blocked {
        return Err(ApiError::forbidden("Account is blocked"));
    }

    let is_admin = state.permission_repository.is_admin(user.id).await?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        name: user.name,
        email: user.email,
        is_admin,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::COOKIE};
    use serial_test::serial;

    #[test]
    fn test_cookie_token_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_empty_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token="));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_require_admin() {
        let mut user = AuthUser {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            is_admin: false,
        };
        assert!(matches!(user.require_admin(), Err(ApiError::Forbidden(_))));
        user.is_admin = true;
        assert!(user.require_admin().is_ok());
    }

    #[test]
    #[serial]
    fn test_read_pem_inline_and_missing() {
        unsafe {
            env::set_var("TEST_INLINE_PEM", "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----");
            env::remove_var("TEST_MISSING_PEM");
        }

        assert!(read_pem_from_env("TEST_INLINE_PEM").unwrap().starts_with("-----BEGIN"));
        assert!(read_pem_from_env("TEST_MISSING_PEM").is_err());

        unsafe {
            env::remove_var("TEST_INLINE_PEM");
        }
    }
}
