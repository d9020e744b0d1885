//! Error types for the relay pipeline
//!
//! One crate-wide error enum; every external failure mode the pipeline can
//! hit (Postgres, Redis, I/O, serialization) converts into it with `?`.
//! Connection-level variants carry the name of the connection that died so
//! supervisor log lines identify the culprit.

use std::fmt;
use std::io;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in the relay pipeline
#[derive(Debug)]
pub enum RelayError {
    /// Missing or invalid startup configuration (fatal, never retried)
    Config(String),
    /// Postgres connection or query error
    Postgres(tokio_postgres::Error),
    /// Redis connection or command error
    Redis(redis::RedisError),
    /// Underlying socket / listener error
    Io(io::Error),
    /// JSON encoding error
    Serialize(serde_json::Error),
    /// The bus publisher connection is currently down
    BusUnavailable,
    /// A connection reported itself closed
    ConnectionClosed(&'static str),
    /// A liveness probe did not complete in time
    ProbeTimeout(&'static str),
    /// An in-process channel to a peer component is gone
    ChannelClosed(&'static str),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(msg) => write!(f, "configuration error: {}", msg),
            RelayError::Postgres(e) => write!(f, "postgres error: {}", e),
            RelayError::Redis(e) => write!(f, "redis error: {}", e),
            RelayError::Io(e) => write!(f, "io error: {}", e),
            RelayError::Serialize(e) => write!(f, "serialization error: {}", e),
            RelayError::BusUnavailable => write!(f, "bus publisher connection unavailable"),
            RelayError::ConnectionClosed(name) => write!(f, "{} connection closed", name),
            RelayError::ProbeTimeout(name) => write!(f, "{} liveness probe timed out", name),
            RelayError::ChannelClosed(name) => write!(f, "{} channel closed", name),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Postgres(e) => Some(e),
            RelayError::Redis(e) => Some(e),
            RelayError::Io(e) => Some(e),
            RelayError::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for RelayError {
    fn from(e: tokio_postgres::Error) -> Self {
        RelayError::Postgres(e)
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(e: redis::RedisError) -> Self {
        RelayError::Redis(e)
    }
}

impl From<io::Error> for RelayError {
    fn from(e: io::Error) -> Self {
        RelayError::Io(e)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialize(e)
    }
}
