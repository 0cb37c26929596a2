//! Exponential backoff for visibility polling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// First poll interval of outcome observation.
pub const POLL_INITIAL: Duration = Duration::from_millis(10);

/// Longest poll interval of outcome observation.
pub const POLL_MAX: Duration = Duration::from_millis(200);

/// Exponential backoff with configurable min/max.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExponentialBackoff {
    max: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    /// Creates a new backoff starting at `initial`, capping at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            max,
            current: initial,
        }
    }

    /// The schedule used while waiting for page text.
    pub fn polling() -> Self {
        Self::new(POLL_INITIAL, POLL_MAX)
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Advances to the next interval (doubles, capped at max).
    pub fn next(&mut self) {
        self.current = (self.current * 2).min(self.max);
    }

    /// Sleeps for the current interval, never past `deadline`, then advances.
    ///
    /// Returns false without sleeping once `deadline` has passed.
    pub async fn wait_until(&mut self, deadline: tokio::time::Instant) -> bool {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return false;
        }
        let pause = self.current.min(deadline - now);
        tokio::time::sleep(pause).await;
        self.next();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_schedule_doubles_to_cap() {
        let mut backoff = ExponentialBackoff::polling();
        assert_eq!(backoff.current(), Duration::from_millis(10));
        backoff.next();
        assert_eq!(backoff.current(), Duration::from_millis(20));
        for _ in 0..10 {
            backoff.next();
        }
        assert_eq!(backoff.current(), Duration::from_millis(200));
    }

    #[test]
    fn custom_schedule_caps_at_max() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(5), Duration::from_secs(12));
        backoff.next();
        assert_eq!(backoff.current(), Duration::from_secs(10));
        backoff.next();
        assert_eq!(backoff.current(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn wait_stops_at_deadline() {
        let mut backoff = ExponentialBackoff::polling();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(15);
        assert!(backoff.wait_until(deadline).await);
        assert!(backoff.wait_until(deadline).await);
        assert!(!backoff.wait_until(deadline).await);
    }
}
