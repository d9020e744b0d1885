//! Relay server binary
//!
//! Hosts the whole pipeline in one process: the Postgres capture task, the
//! bus publisher connection, the sequencer, the fan-out subscriber and the
//! WebSocket server, all sharing one cancellation token. A termination
//! signal cancels the token; every reconnect loop exits at its next
//! suspension point and the WebSocket server drains gracefully.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use orders_relay::api;
use orders_relay::api::websocket::{AppState, ClientRegistry};
use orders_relay::bus;
use orders_relay::capture;
use orders_relay::config::Config;
use orders_relay::fanout;
use orders_relay::relay::{self, Sequencer};
use orders_relay::supervisor::wait_for_shutdown_signal;
use orders_relay::types::RelayResult;

/// Capacity of the capture → sequencer channel
const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> RelayResult<()> {
    // The only non-retried failure: missing configuration ends the process
    // before any connection is attempted.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[config] {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if wait_for_shutdown_signal().await.is_ok() {
                eprintln!("[main] shutdown signal received");
            }
            token.cancel();
        });
    }

    let (raw_tx, raw_rx) = mpsc::channel(EVENT_BUFFER);
    let (bus_slot, bus_handle) = bus::slot();
    let registry = Arc::new(ClientRegistry::new());

    let bus_task = tokio::spawn(bus::run(config.clone(), bus_slot, shutdown.clone()));
    let capture_task = tokio::spawn(capture::run(config.clone(), raw_tx, shutdown.clone()));
    let relay_task = tokio::spawn(relay::run(
        raw_rx,
        Sequencer::new(bus_handle.clone()),
        bus_handle,
        shutdown.clone(),
    ));
    let fanout_task = tokio::spawn(fanout::run(
        config.clone(),
        registry.clone(),
        shutdown.clone(),
    ));

    let state = Arc::new(AppState::new(registry));
    let app = api::create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    eprintln!("[main] websocket server listening on {}", addr);

    let serve_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_token.cancelled().await })
        .await?;

    // Server is down; make sure the pipeline tasks stop too (covers the
    // serve loop ending on its own rather than via signal).
    shutdown.cancel();
    let _ = tokio::join!(bus_task, capture_task, relay_task, fanout_task);
    eprintln!("[main] all components stopped");
    Ok(())
}
