//! Bounded retry with exponential backoff
//!
//! The policy is a plain value consulted by the worker rather than an
//! inline loop, so the retry budget, the backoff curve, and the deadline
//! interaction can each be tested on their own.

use std::time::Duration;

use rand::Rng;
use shared::{ApiFailure, ProviderTier};
use tokio::time::Instant;

/// Retry budget and backoff curve for one provider
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first call, so the total call budget is
    /// `max_retries + 1`
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Slower tiers fail slower, so their backoff starts wider
    pub fn for_tier(tier: ProviderTier) -> Self {
        let base_delay = match tier {
            ProviderTier::Fast => Duration::from_millis(1000),
            ProviderTier::Medium => Duration::from_millis(1500),
            ProviderTier::Slow => Duration::from_millis(2000),
        };
        Self {
            max_retries: 2,
            base_delay,
            multiplier: 2.0,
        }
    }

    /// Total external calls this policy may issue for one attempt
    pub fn call_budget(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before retry number `retry_index` (0-based), with up to 10%
    /// jitter so synchronized workers don't re-dial in lockstep
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let exp = self.multiplier.powi(retry_index as i32);
        let base = self.base_delay.as_secs_f64() * exp;
        let jitter = rand::thread_rng().gen_range(0.0..0.1);
        Duration::from_secs_f64(base * (1.0 + jitter))
    }

    /// Whether one more call is allowed after `failure`, given how many
    /// retries ran already and when the job deadline falls. A retry is
    /// refused outright when its backoff alone would cross the deadline.
    pub fn should_retry(&self, failure: &ApiFailure, retry_index: u32, deadline: Instant) -> bool {
        if !failure.is_retryable() || retry_index >= self.max_retries {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.delay_floor(retry_index) < remaining
    }

    /// Jitter-free lower bound of `delay_for`, used for deadline checks
    fn delay_floor(&self, retry_index: u32) -> Duration {
        let exp = self.multiplier.powi(retry_index as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * exp)
    }
}
