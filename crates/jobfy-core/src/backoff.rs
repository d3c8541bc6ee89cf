use std::time::Duration;

use rand::Rng;

/// Retry configuration with capped exponential backoff.
///
/// Delay schedule for retry `n` (0-indexed): `min(base * 2^n, max_delay)`,
/// stretched by a random factor in `[1, 1 + jitter)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the step added at random. Kept below 1.0 so successive
    /// delays stay strictly increasing until the cap.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.5,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.99);
        self
    }

    /// Deterministic part of the delay for retry `retry` (0-indexed).
    pub fn step_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }

    /// Full delay for retry `retry`, including jitter.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let step = self.step_for_retry(retry);
        if self.jitter <= 0.0 || step.is_zero() {
            return step;
        }
        let extra = rand::rng().random_range(0.0..self.jitter);
        step.mul_f64(1.0 + extra)
    }
}

/// Retry bookkeeping for one site within one run.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    retries: u32,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, retries: 0 }
    }

    /// The delay before the next retry, or `None` once the limit is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries >= self.config.max_retries {
            return None;
        }
        let delay = self.config.delay_for_retry(self.retries);
        self.retries += 1;
        Some(delay)
    }

    /// Retries handed out so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}
