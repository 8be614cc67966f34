use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Wall-clock anchor for a waiting screen.
///
/// `elapsed_seconds` is always re-derived from `started_at`; it is never
/// bumped on its own, so a late or skipped tick cannot make it drift.
#[derive(Debug, Clone)]
pub struct Clock {
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    elapsed_seconds: u64,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            elapsed_seconds: 0,
        }
    }

    /// Recompute elapsed seconds from the current instant and return them.
    pub fn tick(&mut self) -> u64 {
        self.elapsed_seconds = self.started_at.elapsed().as_secs();
        self.elapsed_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn started_at_utc(&self) -> DateTime<Utc> {
        self.started_at_utc
    }

    #[cfg(test)]
    pub(crate) fn at(elapsed_seconds: u64) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            elapsed_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn tick_follows_wall_clock() {
        let mut clock = Clock::start();
        assert_eq!(clock.elapsed_seconds(), 0);

        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert_eq!(clock.tick(), 2);

        // Skipping ticks doesn't lose time.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.tick(), 12);
        assert_eq!(clock.elapsed_seconds(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_frozen_between_ticks() {
        let mut clock = Clock::start();
        tokio::time::advance(Duration::from_secs(5)).await;
        clock.tick();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.elapsed_seconds(), 5);
    }
}
