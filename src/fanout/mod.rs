//! Fan-out broadcaster
//!
//! Subscribes to the bus topic and forwards every received message verbatim
//! to all currently-open client connections. Broadcast is fire-and-forget
//! per client: a connection that is closed or errors mid-broadcast is
//! skipped silently and never disturbs delivery to the others.
//!
//! While the subscriber connection is down, messages published on the bus
//! are simply lost — there is no buffering — and clients receive nothing
//! until the supervisor reconnects.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::websocket::registry::ClientRegistry;
use crate::config::{Config, BUS_TOPIC};
use crate::supervisor::{Backoff, SessionGuard, Supervisor};
use crate::types::{RelayError, RelayResult};

/// Forward one bus payload to every open client in the registry, returning
/// how many clients it was queued for.
pub fn broadcast(registry: &ClientRegistry, payload: &str) -> usize {
    let mut delivered = 0;
    for client in registry.snapshot() {
        if !client.is_open() {
            continue;
        }
        if client.send(Message::Text(payload.to_string())) {
            delivered += 1;
        }
    }
    delivered
}

/// Run the bus subscriber until shutdown.
pub async fn run(config: Config, registry: Arc<ClientRegistry>, shutdown: CancellationToken) {
    let supervisor = Supervisor::new("fanout", Backoff::default(), shutdown.clone());
    supervisor
        .run(move |guard| {
            let redis_url = config.redis_url.clone();
            let registry = registry.clone();
            let shutdown = shutdown.clone();
            async move { session(redis_url, registry, shutdown, guard).await }
        })
        .await;
    eprintln!("[fanout] stopped");
}

async fn session(
    redis_url: String,
    registry: Arc<ClientRegistry>,
    shutdown: CancellationToken,
    guard: SessionGuard,
) -> RelayResult<()> {
    eprintln!("[fanout] connecting bus subscriber...");
    let client = redis::Client::open(redis_url.as_str())?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(BUS_TOPIC).await?;
    guard.mark_connected();
    eprintln!("[fanout] subscribed to {}", BUS_TOPIC);

    let mut messages = pubsub.on_message();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            message = messages.next() => match message {
                Some(message) => {
                    let payload: String = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            eprintln!("[fanout] undecodable bus message, skipping: {}", e);
                            continue;
                        }
                    };
                    let delivered = broadcast(&registry, &payload);
                    eprintln!(
                        "[fanout] forwarded to {}/{} clients",
                        delivered,
                        registry.len()
                    );
                }
                // Stream end is the only disconnect signal a subscriber gets
                None => return Err(RelayError::ConnectionClosed("bus subscriber")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_broadcast_reaches_all_open_clients() {
        let registry = ClientRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.add(tx_a);
        registry.add(tx_b);

        let delivered = broadcast(&registry, r#"{"_pub_id":1}"#);
        assert_eq!(delivered, 2);

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                Message::Text(text) => assert_eq!(text, r#"{"_pub_id":1}"#),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_closed_client_does_not_disturb_the_others() {
        let registry = ClientRegistry::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        registry.add(tx_dead);
        registry.add(tx_live);

        // Transport gone, but the socket task has not removed it yet
        drop(rx_dead);

        let delivered = broadcast(&registry, "update");
        assert_eq!(delivered, 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry_is_a_noop() {
        let registry = ClientRegistry::new();
        assert_eq!(broadcast(&registry, "update"), 0);
    }
}
