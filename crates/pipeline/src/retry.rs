//! Retry decisions.

use std::time::Duration;

use rand::Rng;

use crate::error::PipelineError;

/// Outcome of [`RetryStrategy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// How the delay grows between attempts. Every variant stays within
/// `[min_delay, max_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Always `min_delay`.
    Fixed,

    /// `min_delay * attempt`, capped at `max_delay`.
    #[default]
    Linear,

    /// Uniformly random within the range.
    Jittered,
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "linear" => Ok(Backoff::Linear),
            "jittered" | "jitter" => Ok(Backoff::Jittered),
            other => Err(format!("unknown backoff: {other}")),
        }
    }
}

/// Decides whether a failed attempt is retried and after how long.
///
/// Only conflicts and transient failures are retried. `max_attempts`
/// bounds the retries that follow the first execution, so a message runs
/// at most `max_attempts + 1` times. Apart from drawing jitter the
/// decision has no side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    max_attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
    backoff: Backoff,
    max_elapsed: Option<Duration>,
}

impl RetryStrategy {
    /// Creates a strategy with linear backoff. A `max_delay` below
    /// `min_delay` is raised to it.
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            min_delay,
            max_delay: max_delay.max(min_delay),
            backoff: Backoff::default(),
            max_elapsed: None,
        }
    }

    /// A strategy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Stops retrying once this much time has passed since the first attempt.
    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = Some(budget);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// `attempt` is the number of failed attempts so far, the one being
    /// judged included. `NoRetry` once it exceeds `max_attempts`.
    pub fn decide(&self, error: &PipelineError, elapsed: Duration, attempt: u32) -> RetryDecision {
        if !error.category().is_retryable() || attempt > self.max_attempts {
            return RetryDecision::NoRetry;
        }
        if self.max_elapsed.is_some_and(|budget| elapsed >= budget) {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.min_delay,
            Backoff::Linear => self.min_delay.saturating_mul(attempt),
            Backoff::Jittered if self.min_delay < self.max_delay => {
                rand::rng().random_range(self.min_delay..=self.max_delay)
            }
            Backoff::Jittered => self.min_delay,
        };
        delay.clamp(self.min_delay, self.max_delay)
    }
}

impl Default for RetryStrategy {
    /// Three retries, 50ms to 1s, linear.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50), Duration::from_secs(1))
    }
}
