//! HTTP and WebSocket surface
//!
//! The fan-out side of the pipeline: an Axum server exposing the WebSocket
//! endpoint clients subscribe on, plus a health check.

pub mod http;
pub mod websocket;

pub use http::create_router;
