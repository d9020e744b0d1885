//! Orders Relay
//!
//! Relays change events from Postgres to WebSocket subscribers with
//! ordered, monotonically-numbered delivery. Three stages connected by a
//! Redis pub/sub bus:
//!
//! 1. **Change capture** — `LISTEN`s on a Postgres notification channel and
//!    turns each `NOTIFY` payload into a raw change event.
//! 2. **Sequencer/relay** — assigns each event a durable monotonic id via
//!    Redis `INCR`, then republishes it on the bus topic.
//! 3. **Fan-out** — subscribes to the bus topic and forwards every message
//!    verbatim to all open WebSocket clients.
//!
//! Every external connection is self-healing: a shared supervisor retries
//! it forever with capped exponential backoff, and delivery is at-most-once
//! by design — consumers see gaps in the sequence during outages, never
//! errors.
//!
//! # Modules
//!
//! - `types`: event model and the crate-wide error type
//! - `config`: environment configuration and fixed channel names
//! - `supervisor`: reconnect loop, backoff and shutdown signal handling
//! - `capture`: Postgres LISTEN/NOTIFY change capture
//! - `relay`: sequence assignment and bus publishing
//! - `bus`: the supervised Redis publisher connection
//! - `fanout`: bus subscriber and per-client broadcast
//! - `api`: Axum HTTP/WebSocket surface and the client registry

pub mod api;
pub mod bus;
pub mod capture;
pub mod config;
pub mod fanout;
pub mod relay;
pub mod supervisor;
pub mod types;

// Re-export commonly used items at crate root
pub use api::websocket::{AppState, ClientRegistry};
pub use config::Config;
pub use relay::{EventSink, SequenceCounter, Sequencer};
pub use supervisor::{Backoff, ConnectionState, Supervisor};
pub use types::{ChangePayload, RawChangeEvent, RelayError, RelayResult, SequencedEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
