//! Bus publisher connection
//!
//! The bus (Redis) is an external service; this module owns the single
//! connection the sequencer uses for both `INCR` (sequence assignment) and
//! `PUBLISH`. The connection is maintained by its own supervised task,
//! independent of the Postgres listener, and shared with the relay through a
//! watch slot: `Some(conn)` while healthy, `None` while reconnecting. The
//! relay never waits for the slot to fill — an event that arrives while the
//! slot is empty is dropped, which is what keeps a broken bus from ever
//! blocking the pipeline.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::relay::{EventSink, SequenceCounter};
use crate::supervisor::{Backoff, SessionGuard, Supervisor, LIVENESS_INTERVAL};
use crate::types::{RelayError, RelayResult};

/// Create the connection slot shared between the supervised task (writer)
/// and the relay (reader).
pub fn slot() -> (watch::Sender<Option<MultiplexedConnection>>, BusHandle) {
    let (tx, rx) = watch::channel(None);
    (tx, BusHandle { slot: rx })
}

/// Read side of the bus connection slot. Cheap to clone; used by the relay
/// for sequence increments and publishes.
#[derive(Clone)]
pub struct BusHandle {
    slot: watch::Receiver<Option<MultiplexedConnection>>,
}

impl BusHandle {
    pub fn is_connected(&self) -> bool {
        self.slot.borrow().is_some()
    }

    fn current(&self) -> RelayResult<MultiplexedConnection> {
        self.slot.borrow().clone().ok_or(RelayError::BusUnavailable)
    }
}

impl SequenceCounter for BusHandle {
    async fn increment(&self, key: &str) -> RelayResult<u64> {
        let mut conn = self.current()?;
        let id: u64 = conn.incr(key, 1u32).await?;
        Ok(id)
    }
}

impl EventSink for BusHandle {
    async fn publish(&self, topic: &str, body: &str) -> RelayResult<usize> {
        let mut conn = self.current()?;
        let receivers: i64 = conn.publish(topic, body).await?;
        Ok(receivers.max(0) as usize)
    }
}

/// Maintain the publisher connection until shutdown, filling and emptying
/// the slot as it comes and goes.
pub async fn run(
    config: Config,
    slot: watch::Sender<Option<MultiplexedConnection>>,
    shutdown: CancellationToken,
) {
    let supervisor = Supervisor::new("bus", Backoff::default(), shutdown.clone());
    supervisor
        .run(move |guard| {
            let redis_url = config.redis_url.clone();
            let slot = slot.clone();
            let shutdown = shutdown.clone();
            async move { session(redis_url, slot, shutdown, guard).await }
        })
        .await;
}

async fn session(
    redis_url: String,
    slot: watch::Sender<Option<MultiplexedConnection>>,
    shutdown: CancellationToken,
    guard: SessionGuard,
) -> RelayResult<()> {
    eprintln!("[bus] connecting publisher...");
    let client = redis::Client::open(redis_url.as_str())?;
    let mut conn = client.get_multiplexed_async_connection().await?;

    // Round-trip before handing the connection out
    let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    let _ = slot.send(Some(conn.clone()));
    guard.mark_connected();
    eprintln!("[bus] publisher connected");

    let mut probe = tokio::time::interval(LIVENESS_INTERVAL);
    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            _ = probe.tick() => {
                let pong: Result<String, redis::RedisError> =
                    redis::cmd("PING").query_async(&mut conn).await;
                if let Err(e) = pong {
                    guard.mark_degraded();
                    break Err(e.into());
                }
            }
        }
    };

    // Empty the slot before the supervisor backs off, so the relay drops
    // events instead of erroring against a dead connection.
    let _ = slot.send(None);
    result
}
