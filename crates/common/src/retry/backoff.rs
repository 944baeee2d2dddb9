// Exponential backoff with jitter
use std::time::Duration;

use rand::Rng;
use redkite_domain::{RedkiteError, Result};

use super::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_DELAY, MAX_BACKOFF_EXPONENT,
};

/// Delay schedule applied before re-dispatching a request
///
/// Attempt numbers are 1-based. The first attempt never waits; attempt `n`
/// waits `base * 2^(n-2)` (capped at `max_delay`) plus or minus half of
/// `jitter_factor` of that amount, so the expected wait doubles with every
/// retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a custom schedule with validation
    ///
    /// # Errors
    ///
    /// Returns [`RedkiteError::Config`] when `base_delay` exceeds `max_delay`.
    pub fn custom(base_delay: Duration, max_delay: Duration) -> Result<Self> {
        if base_delay > max_delay {
            return Err(RedkiteError::Config(format!(
                "base_delay ({base_delay:?}) cannot be greater than max_delay ({max_delay:?})"
            )));
        }
        Ok(Self { base_delay, max_delay, jitter_factor: DEFAULT_JITTER_FACTOR })
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to sleep before dispatching `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.apply_jitter(self.expected_delay(attempt))
    }

    /// Delay for `attempt` without jitter; the mean of [`Self::delay_for`]
    pub fn expected_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let base_millis = self.base_delay.as_millis() as u64;
        let max_millis = self.max_delay.as_millis() as u64;

        let exponent = (attempt - 2).min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);

        Duration::from_millis(base_millis.saturating_mul(multiplier).min(max_millis))
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;

        // -jitter_range/2 to +jitter_range/2
        let jitter = rng.gen_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_millis((delay_millis + jitter).max(0.0) as u64)
    }
}
