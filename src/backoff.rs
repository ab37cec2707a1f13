//! Exponential backoff for fetch retries and task supervision
//!
//! Table units retry indefinitely, so there is no attempt cap; the delay
//! doubles up to a fixed ceiling and resets after a healthy cycle.

use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
        }
    }

    /// Delay for the current attempt.
    pub fn delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Sleep for the current delay and advance to the next attempt.
    pub async fn wait(&mut self) {
        let delay = self.delay();
        log::warn!("⏳ Retrying in {:.1}s", delay.as_secs_f64());
        sleep(delay).await;
        self.attempt = self.attempt.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8));

        assert_eq!(backoff.delay(), Duration::from_secs(1));
        backoff.attempt = 1;
        assert_eq!(backoff.delay(), Duration::from_secs(2));
        backoff.attempt = 2;
        assert_eq!(backoff.delay(), Duration::from_secs(4));
        backoff.attempt = 10;
        assert_eq!(backoff.delay(), Duration::from_secs(8));
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        backoff.attempt = 5;
        backoff.reset();
        assert_eq!(backoff.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let mut backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(30));
        backoff.attempt = u32::MAX;
        assert_eq!(backoff.delay(), Duration::from_secs(30));
    }
}
