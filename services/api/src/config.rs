//! Server settings
//!
//! Read from `API_*` environment variables through the `config` crate.
//! Database and Redis settings live in `common`.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `API_HOST` (default: 0.0.0.0)
    pub host: String,
    /// `API_PORT` (default: 3001)
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001_i64)?
            .add_source(Environment::with_prefix("API").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        unsafe {
            std::env::remove_var("API_HOST");
            std::env::remove_var("API_PORT");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        unsafe {
            std::env::set_var("API_HOST", "127.0.0.1");
            std::env::set_var("API_PORT", "8088");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(
            config,
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8088,
            }
        );

        unsafe {
            std::env::remove_var("API_HOST");
            std::env::remove_var("API_PORT");
        }
    }
}
