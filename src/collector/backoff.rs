use std::time::Duration;

use rand::random_range;

use crate::config::RetryConfig;

/// Capped exponential backoff for failed fetches.
///
/// Every failure returns the current delay and doubles it for the next
/// one, never beyond `max`. A success resets to `initial`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter_ms: u64,
    current: Duration,
    failures: usize,
}

impl Backoff {
    pub fn new(cfg: &RetryConfig) -> Self {
        let initial = Duration::from_millis(cfg.initial_ms.max(1));
        let max = Duration::from_millis(cfg.max_ms).max(initial);
        Self {
            initial,
            max,
            jitter_ms: cfg.jitter_ms,
            current: initial,
            failures: 0,
        }
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        self.failures += 1;

        if self.jitter_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(random_range(0..=self.jitter_ms))
        }
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(initial_ms: u64, max_ms: u64, jitter_ms: u64) -> RetryConfig {
        RetryConfig { initial_ms, max_ms, jitter_ms }
    }

    #[test]
    fn doubles_up_to_cap() {
        let mut b = Backoff::new(&retry(100, 1_000, 0));
        let delays: Vec<u64> = (0..7).map(|_| b.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000, 1_000]);
        assert_eq!(b.failures(), 7);
    }

    #[test]
    fn reset_restarts_from_initial() {
        let mut b = Backoff::new(&retry(50, 400, 0));
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.failures(), 0);
        assert_eq!(b.next_delay(), Duration::from_millis(50));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let mut b = Backoff::new(&retry(100, 100, 20));
        for _ in 0..50 {
            let d = b.next_delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(120), "{d:?}");
        }
    }

    #[test]
    fn max_below_initial_is_lifted() {
        let mut b = Backoff::new(&retry(300, 100, 0));
        assert_eq!(b.next_delay(), Duration::from_millis(300));
        assert_eq!(b.next_delay(), Duration::from_millis(300));
    }
}
