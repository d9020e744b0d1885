//! Startup configuration
//!
//! Connection strings come from the environment and are validated once,
//! before any connection is attempted. A missing required variable is the
//! single fatal, non-retried error path in the whole pipeline: the process
//! exits non-zero immediately. Channel and key names are fixed and shared
//! with external consumers, so they live here as constants rather than
//! configuration.

use std::env;

use crate::types::{RelayError, RelayResult};

/// Postgres notification channel the capture stage listens on
pub const PG_CHANNEL: &str = "orders_channel";

/// Redis pub/sub topic carrying sequenced events
pub const BUS_TOPIC: &str = "orders_updates";

/// Redis key holding the durable monotonic sequence counter
pub const SEQUENCE_KEY: &str = "orders:msg_id";

/// WebSocket listen port when PORT is not set
pub const DEFAULT_PORT: u16 = 8080;

/// Validated startup configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string (DATABASE_URL)
    pub database_url: String,
    /// Redis connection string (REDIS_URL)
    pub redis_url: String,
    /// WebSocket listen port (PORT, default 8080)
    pub port: u16,
}

impl Config {
    /// Load and validate configuration from the environment
    pub fn from_env() -> RelayResult<Self> {
        let database_url = require("DATABASE_URL")?;
        let redis_url = require("REDIS_URL")?;
        let port = match env::var("PORT") {
            Ok(value) => value.parse().map_err(|_| {
                RelayError::Config(format!("PORT is not a valid port number: {}", value))
            })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            redis_url,
            port,
        })
    }
}

fn require(name: &'static str) -> RelayResult<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RelayError::Config(format!("missing required environment variable {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so all from_env coverage
    // lives in this single test.
    #[test]
    fn test_from_env() {
        env::set_var("DATABASE_URL", "postgres://localhost/orders");
        env::set_var("REDIS_URL", "redis://localhost");
        env::remove_var("PORT");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, "postgres://localhost/orders");
        assert_eq!(config.port, DEFAULT_PORT);

        env::set_var("PORT", "9000");
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 9000);

        env::set_var("PORT", "not-a-port");
        assert!(Config::from_env().is_err());
        env::remove_var("PORT");

        env::remove_var("DATABASE_URL");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        env::set_var("DATABASE_URL", "postgres://localhost/orders");
        env::set_var("REDIS_URL", "");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));
    }
}
