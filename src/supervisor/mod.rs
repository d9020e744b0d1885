//! Connection supervision
//!
//! Every external connection in the pipeline (store listener, bus publisher,
//! bus subscriber) follows the same connect-listen-monitor-reconnect shape.
//! [`Supervisor`] owns that shape once: it runs a session closure, and when
//! the session fails it waits out the shared [`Backoff`] and runs it again.
//! Transient connection errors never escape the supervisor; the only exits
//! are cancellation and a session returning `Ok` (clean shutdown).
//!
//! A session does the connection-specific work — connect, subscribe,
//! pump messages, probe liveness — and talks back through its
//! [`SessionGuard`]: `mark_connected` once the subscription is live (resets
//! the backoff, so an hour-old connection that dies retries immediately at
//! the base delay) and `mark_degraded` when a liveness probe fails on a
//! connection that still claims to be open. Degraded is a trigger to force
//! reconnect, not a separate retry path: the session returns an error right
//! after, and the normal disconnect handling takes over.

mod backoff;
mod signal;

pub use backoff::Backoff;
pub use signal::wait_for_shutdown_signal;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::types::RelayResult;

/// How often sessions probe connection liveness, independent of traffic
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(2);

/// Health of one supervised external connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The connection claims to be live but a liveness probe failed;
    /// always followed by a forced reconnect
    Degraded,
}

/// Handle a session uses to report its connection health
pub struct SessionGuard {
    state: watch::Sender<ConnectionState>,
    connected: Arc<AtomicBool>,
}

impl SessionGuard {
    /// Call once the connection is established and subscribed. Resets the
    /// supervisor's backoff.
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.state.send(ConnectionState::Connected);
    }

    /// Call when a liveness probe fails on a connection that still reports
    /// itself open, just before returning the error.
    pub fn mark_degraded(&self) {
        let _ = self.state.send(ConnectionState::Degraded);
    }
}

/// Reconnect loop shared by every external connection
pub struct Supervisor {
    name: &'static str,
    backoff: Backoff,
    shutdown: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl Supervisor {
    pub fn new(name: &'static str, backoff: Backoff, shutdown: CancellationToken) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            name,
            backoff,
            shutdown,
            state,
        }
    }

    /// Observe the supervised connection's state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run `session` until it returns `Ok` (clean shutdown) or the token is
    /// cancelled. A failing session is retried forever with backoff; there
    /// is no maximum retry count.
    pub async fn run<F, Fut>(mut self, mut session: F)
    where
        F: FnMut(SessionGuard) -> Fut,
        Fut: Future<Output = RelayResult<()>>,
    {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let _ = self.state.send(ConnectionState::Connecting);
            let connected = Arc::new(AtomicBool::new(false));
            let guard = SessionGuard {
                state: self.state.clone(),
                connected: connected.clone(),
            };

            match session(guard).await {
                Ok(()) => break,
                Err(e) => {
                    if connected.load(Ordering::SeqCst) {
                        self.backoff.reset();
                    }
                    let _ = self.state.send(ConnectionState::Disconnected);
                    if self.shutdown.is_cancelled() {
                        break;
                    }

                    let delay = self.backoff.next();
                    eprintln!(
                        "[{}] {}; reconnecting in {}ms (attempt {})",
                        self.name,
                        e,
                        delay.as_millis(),
                        self.backoff.attempt()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.cancelled() => break,
                    }
                }
            }
        }
        let _ = self.state.send(ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use crate::types::RelayError;

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_session_succeeds() {
        let shutdown = CancellationToken::new();
        let supervisor = Supervisor::new("test", Backoff::default(), shutdown);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        supervisor
            .run(move |guard| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Err(RelayError::ConnectionClosed("test"))
                    } else {
                        guard.mark_connected();
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retry_loop() {
        let shutdown = CancellationToken::new();
        let supervisor = Supervisor::new("test", Backoff::default(), shutdown.clone());
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let token = shutdown.clone();
        supervisor
            .run(move |_guard| {
                let counter = counter.clone();
                let token = token.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) >= 1 {
                        token.cancel();
                    }
                    Err(RelayError::ConnectionClosed("test"))
                }
            })
            .await;

        // Second session cancels; the loop must exit instead of scheduling
        // another retry.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_connect_resets_backoff() {
        let shutdown = CancellationToken::new();
        let supervisor =
            Supervisor::new("test", Backoff::default(), shutdown.clone());
        let mut state = supervisor.watch_state();
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let token = shutdown.clone();
        let start = tokio::time::Instant::now();
        supervisor
            .run(move |guard| {
                let counter = counter.clone();
                let token = token.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    match n {
                        // Two straight connect failures grow the backoff...
                        0 | 1 => Err(RelayError::ConnectionClosed("test")),
                        // ...then a session that connects before dying
                        // resets it, so the next delay is base again.
                        2 => {
                            guard.mark_connected();
                            Err(RelayError::ConnectionClosed("test"))
                        }
                        _ => {
                            token.cancel();
                            Ok(())
                        }
                    }
                }
            })
            .await;

        // base(1000) + base*1.5(1500) + base-after-reset(1000)
        assert_eq!(start.elapsed(), Duration::from_millis(3500));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);
    }
}
