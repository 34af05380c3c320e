//! Exponential backoff for reconnecting the change feed.

use std::time::Duration;

use rand::Rng;

/// Delay schedule: `base * 2^attempt`, capped, plus up to 25% jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, without jitter.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Delay before the next attempt (with jitter), advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay();
        self.attempt = self.attempt.saturating_add(1);

        let jitter_ms = u64::try_from(delay.as_millis() / 4).unwrap_or(0);
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Start over after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(backoff.current_delay());
            let _ = backoff.next_delay();
        }
        assert_eq!(
            seen,
            [100, 200, 400, 800, 1000, 1000].map(Duration::from_millis)
        );
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let mut backoff = Backoff::new(Duration::from_millis(400), Duration::from_secs(30));
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(500));
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::default();
        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.current_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let mut backoff = Backoff::default();
        for _ in 0..100 {
            let _ = backoff.next_delay();
        }
        assert!(backoff.current_delay() <= Duration::from_secs(30));
    }
}
