//! WebSocket endpoint: client registry, connection handling and the
//! messages the server composes itself.

pub mod events;
pub mod handler;
pub mod registry;
pub mod state;

pub use registry::{ClientHandle, ClientRegistry};
pub use state::AppState;
