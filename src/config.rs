//! Limiter configuration.
//!
//! A [`RateLimiterConfig`] describes the rate, the initial bucket fill and the
//! call tracking options. It is validated when handed to
//! [`RateLimiter::new`](crate::RateLimiter::new), never earlier.

use std::time::Duration;

use crate::cores::{TokenBucketConfig, DEFAULT_HISTORY_WINDOW};
use crate::error::{RateLimiterError, Result};

/// How the allowed rate is expressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateSpec {
    /// `limit` calls per `period`; capacity is `limit`.
    PerPeriod {
        /// Calls allowed per period, and the bucket capacity.
        limit: u64,
        /// Length of the period.
        period: Duration,
    },
    /// Legacy form: calls per second, used as both rate and capacity.
    CallsPerSecond(f64),
    /// No limit at all.
    Unlimited,
}

/// What to do when a limiter is built from the legacy calls-per-second form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeprecationPolicy {
    /// Log a deprecation warning through `tracing`.
    #[default]
    Warn,
    /// Build silently.
    Silent,
}

/// Configuration for a [`RateLimiter`](crate::RateLimiter).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use rate_guard_limiter::{RateLimiter, RateLimiterConfig};
///
/// let config = RateLimiterConfig::per_period(120, Duration::from_secs(60))
///     .with_initial_tokens(10.0)
///     .with_tracking(true);
///
/// let limiter = RateLimiter::new(config).unwrap();
/// assert_eq!(limiter.available_tokens().floor(), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    pub rate: RateSpec,
    /// Tokens available at construction; `None` starts full.
    pub initial_tokens: Option<f64>,
    pub track_calls: bool,
    /// How long per-call history is kept for windowed queries.
    pub history_window: Duration,
    pub deprecation: DeprecationPolicy,
}

impl Default for RateLimiterConfig {
    /// One call per second, starting full, without tracking.
    fn default() -> Self {
        Self::per_second(1)
    }
}

impl RateLimiterConfig {
    /// Creates a configuration for the given rate with default options.
    pub fn new(rate: RateSpec) -> Self {
        Self {
            rate,
            initial_tokens: None,
            track_calls: false,
            history_window: DEFAULT_HISTORY_WINDOW,
            deprecation: DeprecationPolicy::Warn,
        }
    }

    /// `limit` calls per `period`.
    pub fn per_period(limit: u64, period: Duration) -> Self {
        Self::new(RateSpec::PerPeriod { limit, period })
    }

    /// `limit` calls per second.
    pub fn per_second(limit: u64) -> Self {
        Self::per_period(limit, Duration::from_secs(1))
    }

    /// Legacy calls-per-second form.
    ///
    /// Prefer [`per_period`](Self::per_period); this form maps the value onto
    /// both rate and capacity.
    pub fn calls_per_second(max_calls_per_second: f64) -> Self {
        Self::new(RateSpec::CallsPerSecond(max_calls_per_second))
    }

    pub fn unlimited() -> Self {
        Self::new(RateSpec::Unlimited)
    }

    pub fn with_initial_tokens(mut self, initial_tokens: f64) -> Self {
        self.initial_tokens = Some(initial_tokens);
        self
    }

    pub fn with_tracking(mut self, track_calls: bool) -> Self {
        self.track_calls = track_calls;
        self
    }

    pub fn with_history_window(mut self, history_window: Duration) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn with_deprecation(mut self, deprecation: DeprecationPolicy) -> Self {
        self.deprecation = deprecation;
        self
    }

    /// Checks every option and resolves the bucket parameters.
    ///
    /// Returns `None` for an unlimited rate, which has no bucket parameters.
    pub(crate) fn validate(&self) -> Result<Option<TokenBucketConfig>> {
        if self.history_window.is_zero() {
            return Err(RateLimiterError::InvalidHistoryWindow);
        }

        let (refill_rate, capacity) = match self.rate {
            RateSpec::PerPeriod { limit, period } => {
                if limit == 0 {
                    return Err(RateLimiterError::InvalidLimit);
                }
                if period.is_zero() {
                    return Err(RateLimiterError::InvalidPeriod(period));
                }
                let limit = limit as f64;
                (limit / period.as_secs_f64(), limit)
            }
            RateSpec::CallsPerSecond(rate) => {
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(RateLimiterError::InvalidRate(rate));
                }
                (rate, rate)
            }
            RateSpec::Unlimited => return Ok(None),
        };

        let initial_tokens = self.initial_tokens.unwrap_or(capacity);
        if !(0.0..=capacity).contains(&initial_tokens) {
            return Err(RateLimiterError::InvalidInitialTokens {
                initial: initial_tokens,
                capacity,
            });
        }

        Ok(Some(TokenBucketConfig::new(refill_rate, capacity, initial_tokens)))
    }
}
