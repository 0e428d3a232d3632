//! Redis cache module
//!
//! Redis only holds short-lived auth state (revoked JWTs). Metadata, records
//! and permissions are never cached; every read goes to PostgreSQL.

use anyhow::Result;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{debug, info};

const REVOKED_PREFIX: &str = "revoked_token";

/// Where the revocation list lives
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `REDIS_URL`, e.g. `redis://localhost:6379`
    pub url: String,
}

impl RedisConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        })
    }
}

/// Key under which a revoked token is stored
pub fn revoked_token_key(token: &str) -> String {
    format!("{}:{}", REVOKED_PREFIX, token)
}

/// Handle on the revocation list. Cloning shares the client.
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Open a client; connections are established lazily
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!(url = %config.url, "Redis client ready");
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Mark a token as revoked until it would have expired anyway. A token
    /// with no lifetime left needs no entry.
    pub async fn revoke_token(&self, token: &str, remaining_seconds: u64) -> Result<()> {
        if remaining_seconds == 0 {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(revoked_token_key(token), 1_u8, remaining_seconds)
            .await?;
        debug!(ttl = remaining_seconds, "Token revoked");
        Ok(())
    }

    /// Whether a token has been revoked by a logout
    pub async fn is_token_revoked(&self, token: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        Ok(conn.exists(revoked_token_key(token)).await?)
    }

    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoked_token_key_is_namespaced() {
        assert_eq!(revoked_token_key("abc.def"), "revoked_token:abc.def");
    }

    #[tokio::test]
    async fn test_client_opens_without_connecting() -> Result<()> {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };
        RedisPool::new(&config).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
        };
        assert!(RedisPool::new(&config).await.is_err());
    }
}
