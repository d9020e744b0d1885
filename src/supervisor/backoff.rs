//! Exponential backoff for reconnect loops
//!
//! [`Backoff`] controls how reconnect delays grow after repeated connection
//! failures. The delay for attempt `k` (1-indexed) is
//! `min(base × factor^(k-1), cap)`, so the first retry always waits `base`
//! and repeated failures grow toward `cap`. The calculation is pure
//! arithmetic over the attempt number — no clock access — which keeps it
//! deterministic and unit-testable without real time.

use std::time::Duration;

/// Reconnect backoff state shared by every external connection.
///
/// Every reconnect loop in the pipeline uses the same defaults:
/// base 1000 ms, factor 1.5, cap 30 s.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    /// Delay for the first retry
    pub base: Duration,
    /// Maximum delay cap
    pub cap: Duration,
    /// Multiplicative growth factor (>= 1.0)
    pub factor: f64,
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_secs(30), 1.5)
    }
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, factor: f64) -> Self {
        Self {
            base,
            cap,
            factor,
            attempt: 0,
        }
    }

    /// Delay for a given attempt number (1-indexed), independent of state.
    ///
    /// `min(base × factor^(attempt-1), cap)`; attempt 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let cap_secs = self.cap.as_secs_f64();
        let raw_secs = self.base.as_secs_f64() * self.factor.powi(exp);

        if !raw_secs.is_finite() || raw_secs < 0.0 || raw_secs > cap_secs {
            self.cap
        } else {
            Duration::from_secs_f64(raw_secs)
        }
    }

    /// Record a failure: advance the attempt counter and return the delay
    /// to wait before the next try.
    pub fn next(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_for(self.attempt)
    }

    /// Record a successful connection: the next failure starts over at
    /// the base delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Failures recorded since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
