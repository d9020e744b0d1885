//! WebSocket connection handler
//!
//! Each accepted socket registers itself, receives the welcome message, then
//! pumps two directions: queued broadcast messages out, and protocol frames
//! in. Clients are passive receivers — inbound text and binary frames are
//! ignored; only Ping and Close get protocol-level responses. On any close
//! or error the connection removes itself from the registry before the task
//! exits, so removal is synchronous with the transport event.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::mpsc;

use super::events::WelcomeMessage;
use super::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = state.registry.add(tx);
    eprintln!("[ws] client {} connected ({} open)", id, state.registry.len());

    // Welcome precedes any broadcast traffic for this client
    let welcome = match serde_json::to_string(&WelcomeMessage::default()) {
        Ok(json) => json,
        Err(_) => String::new(),
    };
    if socket.send(Message::Text(welcome)).await.is_err() {
        state.registry.remove(id);
        return;
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(message) => {
                    if socket.send(message).await.is_err() {
                        break;
                    }
                }
                // Registry entry gone (server shutting down)
                None => break,
            },

            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Ping(data))) => {
                    let _ = socket.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Passive receivers: ignore anything else the client sends
                Some(Ok(_)) => {}
            },
        }
    }

    state.registry.remove(id);
    eprintln!(
        "[ws] client {} disconnected ({} open)",
        id,
        state.registry.len()
    );
}
