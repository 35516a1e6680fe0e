//! Shared exponential backoff policy
//!
//! Both the request client's retry loop and the realtime channel's reconnect
//! loop take their delays from a [`BackoffPolicy`], so tuning lives in one
//! place (config) instead of being spread across components.

use std::time::Duration;

/// Request retries double the delay each attempt
pub const RETRY_MULTIPLIER: f64 = 2.0;

/// Realtime reconnects grow the delay by half each attempt
pub const RECONNECT_MULTIPLIER: f64 = 1.5;

/// Exponential backoff: `base × multiplier^attempt`, for a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    multiplier: f64,
    max_attempts: u32,
    max_delay: Option<Duration>,
}

impl BackoffPolicy {
    pub fn new(base: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base,
            multiplier: if multiplier < 1.0 { 1.0 } else { multiplier },
            max_attempts,
            max_delay: None,
        }
    }

    /// Policy used for HTTP request retries (`base × 2^attempt`)
    pub fn retry(base: Duration, max_retries: u32) -> Self {
        Self::new(base, RETRY_MULTIPLIER, max_retries)
    }

    /// Policy used for realtime reconnects (`base × 1.5^attempt`)
    pub fn reconnect(base: Duration, max_attempts: u32) -> Self {
        Self::new(base, RECONNECT_MULTIPLIER, max_attempts)
    }

    /// Cap every computed delay at `max`
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Same policy with a different attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempts_made` retries/reconnects
    pub fn allows(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay before the attempt numbered `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.base.as_secs_f64() * factor;
        let delay = if secs.is_finite() && secs < u64::MAX as f64 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::MAX
        };
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Every delay this policy will ever produce, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(|attempt| self.delay_for(attempt))
    }
}
