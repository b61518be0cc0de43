//! Message expiry scheduler
//!
//! Periodic tick source owned by one room session. Each tick yields the
//! instant it fired at, which the session feeds to `Room::tick_at` so every
//! message is aged only for the time it has actually existed. Dropping the
//! scheduler cancels it.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[derive(Debug)]
pub struct ExpiryScheduler {
    interval: Interval,
}

impl ExpiryScheduler {
    /// Start ticking every `period`; the first tick fires one period from now
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next tick and return the current instant
    ///
    /// Cancel safe: dropping the future before completion skips nothing.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await;
        Instant::now()
    }
}
