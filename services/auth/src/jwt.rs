//! JWT service for issuing session tokens
//!
//! Tokens are signed with RS256 using the private key; the API service only
//! holds the public key and verifies them with [`JwtVerifier`]. Revocation
//! lives in Redis (see `common::cache`).

use anyhow::Result;
use api::middleware::{Claims, JwtVerifier, read_pem_from_env};
use config::{Config, Environment};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default session lifetime: 8 hours
pub const DEFAULT_EXPIRY_SECONDS: u64 = 8 * 60 * 60;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Private key for signing tokens
    pub private_key: String,
    /// Public key for verifying tokens
    pub public_key: String,
    /// Session token lifetime in seconds
    pub expiry_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct ExpirySettings {
    expiry_seconds: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY`: private key (PEM) or path to it
    /// - `JWT_PUBLIC_KEY`: public key (PEM) or path to it
    /// - `JWT_EXPIRY_SECONDS`: token lifetime (default: 28800)
    pub fn from_env() -> Result<Self> {
        let settings: ExpirySettings = Config::builder()
            .set_default("expiry_seconds", DEFAULT_EXPIRY_SECONDS as i64)?
            .add_source(Environment::with_prefix("JWT").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(JwtConfig {
            private_key: read_pem_from_env("JWT_PRIVATE_KEY")?,
            public_key: read_pem_from_env("JWT_PUBLIC_KEY")?,
            expiry_seconds: settings.expiry_seconds,
        })
    }
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    verifier: JwtVerifier,
    expiry_seconds: u64,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())?;
        let verifier = JwtVerifier::from_public_key(&config.public_key)?;

        Ok(JwtService {
            encoding_key,
            verifier,
            expiry_seconds: config.expiry_seconds,
        })
    }

    /// Sign a session token for a user
    pub fn generate_token(&self, user_id: i32, email: &str) -> Result<String> {
        let now = now_secs()?;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        let token = encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        self.verifier.verify(token)
    }

    /// Seconds left before `claims` expire
    pub fn remaining_seconds(&self, claims: &Claims) -> Result<u64> {
        Ok(claims.exp.saturating_sub(now_secs()?))
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const PRIVATE_KEY: &str = include_str!("../testdata/jwt_private.pem");
    const PUBLIC_KEY: &str = include_str!("../testdata/jwt_public.pem");

    fn service(expiry_seconds: u64) -> JwtService {
        JwtService::new(JwtConfig {
            private_key: PRIVATE_KEY.to_string(),
            public_key: PUBLIC_KEY.to_string(),
            expiry_seconds,
        })
        .unwrap()
    }

    #[test]
    fn test_token_round_trip() {
        let jwt = service(DEFAULT_EXPIRY_SECONDS);
        let token = jwt.generate_token(42, "ana@example.com").unwrap();

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.exp - claims.iat, DEFAULT_EXPIRY_SECONDS);

        let remaining = jwt.remaining_seconds(&claims).unwrap();
        assert!(remaining <= DEFAULT_EXPIRY_SECONDS && remaining > DEFAULT_EXPIRY_SECONDS - 60);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let jwt = service(DEFAULT_EXPIRY_SECONDS);
        let token = jwt.generate_token(1, "a@b.co").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "c2lnbmF0dXJl";

        assert!(jwt.validate_token(&parts.join(".")).is_err());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        unsafe {
            std::env::set_var("JWT_PRIVATE_KEY", PRIVATE_KEY);
            std::env::set_var("JWT_PUBLIC_KEY", "testdata/jwt_public.pem");
            std::env::set_var("JWT_EXPIRY_SECONDS", "600");
        }

        let config = JwtConfig::from_env().unwrap();
        assert_eq!(config.expiry_seconds, 600);
        assert!(config.public_key.starts_with("-----BEGIN PUBLIC KEY-----"));

        unsafe {
            std::env::remove_var("JWT_EXPIRY_SECONDS");
        }
        assert_eq!(
            JwtConfig::from_env().unwrap().expiry_seconds,
            DEFAULT_EXPIRY_SECONDS
        );

        unsafe {
            std::env::remove_var("JWT_PRIVATE_KEY");
            std::env::remove_var("JWT_PUBLIC_KEY");
        }
    }
}
