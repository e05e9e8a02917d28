//! Backoff between retries of a reconciliation pass.

use std::time::Duration;

use crate::config::ControllerConfig;
use crate::error::OperatorError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
    /// Extra random delay, as a fraction of the computed delay (0.0 to 1.0).
    pub jitter_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn from_controller(config: &ControllerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

pub struct ExponentialBackoff {
    config: RetryConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Only transient errors are retried, and only while retries remain.
    pub fn should_retry(&self, error: &OperatorError) -> bool {
        self.attempt < self.config.max_retries && error.is_transient()
    }

    /// Delay before the next attempt. Advances the retry count.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let exp = self.config.backoff_multiplier.powi(self.attempt as i32 - 1);
        let base =
            Duration::from_millis((self.config.initial_delay.as_millis() as f32 * exp) as u64);
        let capped = base.min(self.config.max_delay);

        let jitter = if self.config.jitter_factor > 0.0 {
            let jitter_ms = (capped.as_millis() as f32 * self.config.jitter_factor) as u64;
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        capped + jitter
    }

    /// Retries taken so far.
    pub fn retries(&self) -> u32 {
        self.attempt
    }
}
