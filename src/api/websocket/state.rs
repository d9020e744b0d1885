//! WebSocket application state

use std::sync::Arc;

use super::registry::ClientRegistry;

/// Shared state for WebSocket connections
pub struct AppState {
    /// Registry of open client connections, shared with the fan-out
    /// broadcaster
    pub registry: Arc<ClientRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}
