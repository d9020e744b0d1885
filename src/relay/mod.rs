//! Sequencer/Relay stage
//!
//! Consumes raw change events from the capture stage, assigns each one a
//! durable monotonic id, and republishes it on the bus topic. The id comes
//! from an atomic increment against the external counter *before* the
//! publish, so two events can never share an id even under concurrent
//! delivery.
//!
//! Failure policy, deliberately asymmetric-free: an increment failure drops
//! the event; a publish failure after a successful increment also drops the
//! event, leaving a permanent gap in the sequence. Neither is retried and
//! the consumed id is never handed back — retrying here would reorder
//! delivery, and buffering would let a broken bus grow an unbounded queue.
//! Downstream consumers must tolerate gaps.
//!
//! The relay is a single task consuming a single channel, which is the
//! entire ordering story: events that arrive in order are sequenced and
//! published in that order.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{BUS_TOPIC, SEQUENCE_KEY};
use crate::types::{RawChangeEvent, RelayResult, SequencedEvent};

/// Atomic increment-and-return against the external counter service
pub trait SequenceCounter {
    fn increment(&self, key: &str) -> impl std::future::Future<Output = RelayResult<u64>> + Send;
}

/// Publish destination for sequenced events; returns the receiver count
/// reported by the bus
pub trait EventSink {
    fn publish(
        &self,
        topic: &str,
        body: &str,
    ) -> impl std::future::Future<Output = RelayResult<usize>> + Send;
}

/// Assigns sequence ids to raw events
pub struct Sequencer<C: SequenceCounter> {
    counter: C,
}

impl<C: SequenceCounter> Sequencer<C> {
    pub fn new(counter: C) -> Self {
        Self { counter }
    }

    /// Turn a raw event into a sequenced one. The increment happens here,
    /// before any publish attempt.
    pub async fn sequence(&self, raw: RawChangeEvent) -> RelayResult<SequencedEvent> {
        let pub_id = self.counter.increment(SEQUENCE_KEY).await?;
        Ok(SequencedEvent::new(raw, pub_id))
    }
}

/// Consume raw events until the capture side hangs up or shutdown is
/// requested. Runs as a single task so arrival order is publish order.
pub async fn run<C, P>(
    mut rx: mpsc::Receiver<RawChangeEvent>,
    sequencer: Sequencer<C>,
    publisher: P,
    shutdown: CancellationToken,
) where
    C: SequenceCounter,
    P: EventSink,
{
    loop {
        let raw = tokio::select! {
            _ = shutdown.cancelled() => break,
            raw = rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };

        let operation = raw.operation.clone();
        let event = match sequencer.sequence(raw).await {
            Ok(event) => event,
            Err(e) => {
                eprintln!(
                    "[relay] sequence assignment failed, dropping event op={}: {}",
                    operation, e
                );
                continue;
            }
        };

        match publisher.publish(BUS_TOPIC, &event.to_json()).await {
            Ok(receivers) => eprintln!(
                "[relay] published id={} receivers={} op={}",
                event.pub_id, receivers, operation
            ),
            Err(e) => eprintln!(
                "[relay] failed to publish id={}, dropping event: {}",
                event.pub_id, e
            ),
        }
    }
    eprintln!("[relay] stopped");
}
