//! Retry policy for deadlocked batches.
//!
//! Waits grow exponentially with the attempt number and are fully jittered:
//! after attempt `n` the writer sleeps a uniformly random duration in
//! `[0, min(max_delay, multiplier * 2^(n - 1))]`. Spreading the retries out
//! keeps the two transactions that deadlocked from colliding again.
//!
//! An optional `min_delay` raises the lower end of that range.

use std::time::Duration;

use rand::Rng;

use crate::env::parse_var_or;
use crate::error::DbError;

/// Default number of attempts, including the first one.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff multiplier in milliseconds.
const DEFAULT_MULTIPLIER_MS: u64 = 1_000;

/// Default backoff cap in milliseconds.
const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

/// Default lower bound of a single wait in milliseconds.
const DEFAULT_MIN_DELAY_MS: u64 = 0;

/// How many times a batch is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    max_attempts: u32,
    /// Scale of the exponential backoff.
    multiplier: Duration,
    /// Upper bound on any single wait.
    max_delay: Duration,
    /// Lower bound on any single wait, itself clamped to the ceiling.
    min_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub const fn new(max_attempts: u32, multiplier: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            multiplier,
            max_delay,
            min_delay: Duration::ZERO,
        }
    }

    /// Set the shortest wait between attempts.
    #[must_use]
    pub const fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Load the policy from environment variables.
    ///
    /// - `WRITER_MAX_ATTEMPTS` -- default 3
    /// - `WRITER_BACKOFF_MULTIPLIER_MS` -- default 1000
    /// - `WRITER_BACKOFF_MAX_MS` -- default 60000
    /// - `WRITER_BACKOFF_MIN_MS` -- default 0
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if a variable does not parse.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`RetryPolicy::from_env`], reading through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if a variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_attempts = parse_var_or(&lookup, "WRITER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let multiplier_ms =
            parse_var_or(&lookup, "WRITER_BACKOFF_MULTIPLIER_MS", DEFAULT_MULTIPLIER_MS)?;
        let max_delay_ms = parse_var_or(&lookup, "WRITER_BACKOFF_MAX_MS", DEFAULT_MAX_DELAY_MS)?;
        let min_delay_ms = parse_var_or(&lookup, "WRITER_BACKOFF_MIN_MS", DEFAULT_MIN_DELAY_MS)?;

        Ok(Self::new(
            max_attempts,
            Duration::from_millis(multiplier_ms),
            Duration::from_millis(max_delay_ms),
        )
        .with_min_delay(Duration::from_millis(min_delay_ms)))
    }

    /// Total attempts allowed, never less than one.
    pub const fn max_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Whether another attempt may follow the given (1-based) attempt.
    pub const fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// The largest wait that may follow the given (1-based) attempt.
    pub fn delay_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        2_u32
            .checked_pow(exponent)
            .and_then(|factor| self.multiplier.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// The smallest wait that may follow the given (1-based) attempt.
    pub fn delay_floor(&self, attempt: u32) -> Duration {
        self.min_delay.min(self.delay_ceiling(attempt))
    }

    /// Draw the wait that follows the given (1-based) attempt.
    pub fn backoff<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.delay_ceiling(attempt);
        let floor = self.delay_floor(attempt);
        if floor == ceiling {
            return ceiling;
        }
        rng.random_range(floor..=ceiling)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier: Duration::from_millis(DEFAULT_MULTIPLIER_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            min_delay: Duration::from_millis(DEFAULT_MIN_DELAY_MS),
        }
    }
}
