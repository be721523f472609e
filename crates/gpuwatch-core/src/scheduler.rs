//! Tick and redraw scheduling driven by an explicit clock.
//!
//! The UI loop polls input with a short timeout and asks the [`Ticker`]
//! whether a live update is due. Nothing here sleeps, so tests step time by
//! hand.

use std::time::{Duration, Instant};

/// Fixed-interval ticker. A late poll fires once and re-arms from `now`;
/// missed ticks are never queued.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Instant,
}

impl Ticker {
    /// First tick is due one interval after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// True when a tick is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }

    /// Time left until the next tick, for sizing an input poll timeout.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }
}

/// Coalescing redraw flag. Any number of requests produce one redraw.
#[derive(Debug, Clone, Default)]
pub struct RedrawGate {
    pending: bool,
}

impl RedrawGate {
    /// Starts pending so the first frame is drawn.
    pub fn new() -> Self {
        Self { pending: true }
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending request, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}
