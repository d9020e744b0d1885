//! Change capture
//!
//! Owns the single Postgres connection. Each session connects, issues
//! `LISTEN` on the notification channel (subscriptions do not survive
//! reconnection, so this happens on every session), and converts incoming
//! notifications into [`RawChangeEvent`]s for the sequencer.
//!
//! tokio-postgres splits a connection into a `Client` and a `Connection`
//! that must be polled to make progress; the session spawns a driver task
//! that pumps the `Connection` and forwards notifications into a local
//! channel. That keeps the client usable for the liveness probe while
//! notifications flow.
//!
//! Liveness runs on a fixed tick regardless of traffic: if the client
//! reports itself closed, or a `SELECT 1` round-trip fails or times out,
//! the session ends and the supervisor reconnects.

use futures::stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, NoTls};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, PG_CHANNEL};
use crate::supervisor::{Backoff, SessionGuard, Supervisor, LIVENESS_INTERVAL};
use crate::types::{RawChangeEvent, RelayError, RelayResult};

/// Listen for store notifications until shutdown, forwarding every event
/// into `tx` (the sequencer's inbound channel).
pub async fn run(
    config: Config,
    tx: mpsc::Sender<RawChangeEvent>,
    shutdown: CancellationToken,
) {
    let supervisor = Supervisor::new("capture", Backoff::default(), shutdown.clone());
    supervisor
        .run(move |guard| {
            let config = config.clone();
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            async move { session(config, tx, shutdown, guard).await }
        })
        .await;
    eprintln!("[capture] stopped");
}

async fn session(
    config: Config,
    tx: mpsc::Sender<RawChangeEvent>,
    shutdown: CancellationToken,
    guard: SessionGuard,
) -> RelayResult<()> {
    eprintln!("[capture] connecting to postgres...");
    let (client, mut connection) = tokio_postgres::connect(&config.database_url, NoTls).await?;

    let (notif_tx, mut notif_rx) = mpsc::unbounded_channel();
    let driver = tokio::spawn(async move {
        let mut messages = stream::poll_fn(move |cx| connection.poll_message(cx));
        while let Some(message) = messages.next().await {
            match message {
                Ok(AsyncMessage::Notification(n)) => {
                    if notif_tx.send(n).is_err() {
                        break;
                    }
                }
                // Notices and any future message kinds are not change events
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let result = async {
        client
            .batch_execute(&format!("LISTEN {}", PG_CHANNEL))
            .await?;
        guard.mark_connected();
        eprintln!("[capture] connected, LISTEN {}", PG_CHANNEL);

        let mut probe = tokio::time::interval(LIVENESS_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                notification = notif_rx.recv() => match notification {
                    Some(n) => {
                        let event = RawChangeEvent::parse(n.payload());
                        if event.is_opaque() {
                            eprintln!(
                                "[capture] non-JSON payload, forwarding as UNKNOWN: {}",
                                n.payload()
                            );
                        }
                        if tx.send(event).await.is_err() {
                            return Err(RelayError::ChannelClosed("relay inbound"));
                        }
                    }
                    // Driver exited: the connection ended without an
                    // explicit error surfacing here.
                    None => return Err(RelayError::ConnectionClosed("postgres")),
                },
                _ = probe.tick() => {
                    if client.is_closed() {
                        guard.mark_degraded();
                        return Err(RelayError::ConnectionClosed("postgres"));
                    }
                    match tokio::time::timeout(LIVENESS_INTERVAL, client.simple_query("SELECT 1")).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            guard.mark_degraded();
                            return Err(e.into());
                        }
                        Err(_) => {
                            guard.mark_degraded();
                            return Err(RelayError::ProbeTimeout("postgres"));
                        }
                    }
                }
            }
        }
    }
    .await;

    driver.abort();
    result
}
