//! Listener settings for the auth service (`AUTH_*` variables)

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// `AUTH_HOST` (default: 0.0.0.0)
    pub host: String,
    /// `AUTH_PORT` (default: 3000)
    pub port: u16,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000_i64)?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
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
    fn test_port_override() {
        unsafe {
            std::env::remove_var("AUTH_HOST");
            std::env::set_var("AUTH_PORT", "4000");
        }

        assert_eq!(AuthConfig::from_env().unwrap().bind_address(), "0.0.0.0:4000");

        unsafe {
            std::env::remove_var("AUTH_PORT");
        }
        assert_eq!(AuthConfig::from_env().unwrap().port, 3000);
    }
}
