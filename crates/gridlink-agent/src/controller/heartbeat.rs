//! Cancellable heartbeat scheduling

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Fixed-interval timer that stops ticking when a shutdown token fires.
///
/// The caller awaits each beat to completion before asking for the next
/// tick, so beats can never overlap; a beat that overruns the interval
/// delays the schedule instead of bursting to catch up.
pub struct HeartbeatTimer {
    timer: Interval,
    shutdown: CancellationToken,
}

impl HeartbeatTimer {
    /// Create a timer that fires every `interval`, starting one full
    /// interval from now.
    pub fn new(interval: Duration, shutdown: CancellationToken) -> Self {
        let mut timer = tokio::time::interval(interval);
        // A missed tick fires once, then the cadence resumes from that
        // point rather than replaying the backlog.
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() would fire immediately; the first beat belongs one
        // full period after registration.
        timer.reset();
        Self { timer, shutdown }
    }

    /// Wait for the next tick.
    ///
    /// Returns false once shutdown is requested; after that no tick is
    /// ever reported again.
    pub async fn tick(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = self.timer.tick() => true,
        }
    }
}
