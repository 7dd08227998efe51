//! Push backoff after failed flushes

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Exponential backoff, doubling from `initial` up to `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            failures: 0,
            next_attempt: None,
        }
    }

    /// Record a failure and return the delay before the next attempt
    pub fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let factor = 2u32.saturating_pow(self.failures - 1);
        let delay = self.initial.saturating_mul(factor).min(self.max);
        self.next_attempt = Some(Instant::now() + delay);
        debug!(failures = self.failures, ?delay, "Backoff::fail");
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.next_attempt = None;
    }

    /// Whether the delay since the last failure has elapsed
    pub fn ready(&self) -> bool {
        self.next_attempt.is_none_or(|at| Instant::now() >= at)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_and_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        let delays: Vec<_> = (0..5).map(|_| backoff.fail().as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 60, 60]);
        assert_eq!(backoff.failures(), 5);
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        backoff.fail();
        assert!(!backoff.ready());
        backoff.reset();
        assert!(backoff.ready());
        assert_eq!(backoff.fail(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_delay_is_immediately_ready() {
        let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO);
        assert!(backoff.ready());
        backoff.fail();
        assert!(backoff.ready());
    }

    #[test]
    fn test_many_failures_do_not_overflow() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(600));
        for _ in 0..100 {
            backoff.fail();
        }
        assert_eq!(backoff.fail(), Duration::from_secs(600));
    }
}
